pub mod cli_updates_sink;
pub mod events;
pub mod generate_podcast;
pub mod media_clock;
pub mod podcast_session;
