use std::time::{SystemTime, UNIX_EPOCH};

/// Format seconds as M:SS, the way the player shows elapsed and total time
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let mins = (seconds / 60.0) as u64;
    let secs = (seconds % 60.0) as u64;
    format!("{}:{:02}", mins, secs)
}

/// Same as [`format_clock`] but renders an unknown length as `--:--`
pub fn format_duration_label(seconds: f64) -> String {
    if seconds > 0.0 && seconds.is_finite() {
        format_clock(seconds)
    } else {
        "--:--".to_string()
    }
}

/// File extension for an audio content type. The backend renders WAV, so that is the default.
pub fn audio_extension(content_type: Option<&str>) -> &'static str {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match essence.as_deref() {
        Some("audio/mpeg") | Some("audio/mp3") => "mp3",
        Some("audio/ogg") => "ogg",
        Some("audio/aac") => "aac",
        Some("audio/flac") | Some("audio/x-flac") => "flac",
        Some("audio/mp4") | Some("audio/x-m4a") => "m4a",
        _ => "wav",
    }
}

/// `ai-podcast-<unix millis>.<ext>`
pub fn download_file_name(content_type: Option<&str>) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("ai-podcast-{}.{}", millis, audio_extension(content_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pads_seconds_only() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(9.9), "0:09");
        assert_eq!(format_clock(522.0), "8:42");
        assert_eq!(format_clock(3725.0), "62:05");
        assert_eq!(format_clock(f64::NAN), "0:00");
        assert_eq!(format_clock(-3.0), "0:00");
    }

    #[test]
    fn unknown_duration_label() {
        assert_eq!(format_duration_label(0.0), "--:--");
        assert_eq!(format_duration_label(61.0), "1:01");
    }

    #[test]
    fn extension_follows_content_type() {
        assert_eq!(audio_extension(None), "wav");
        assert_eq!(audio_extension(Some("audio/mpeg")), "mp3");
        assert_eq!(audio_extension(Some("Audio/OGG; codecs=opus")), "ogg");
        assert_eq!(audio_extension(Some("application/octet-stream")), "wav");
    }

    #[test]
    fn download_name_shape() {
        let name = download_file_name(Some("audio/wav"));
        let stem = name
            .strip_prefix("ai-podcast-")
            .and_then(|rest| rest.strip_suffix(".wav"))
            .unwrap();
        assert!(stem.parse::<u128>().is_ok());
    }
}
