// End-to-end tests for the ReadAloud HTTP API
//
// Every test starts the full router on 127.0.0.1:0 with stub speech backends,
// a temporary cache directory and a temporary playback state file, so tests
// are isolated and run in parallel.

mod helpers;
mod test_cache;
mod test_playback;
mod test_tts;
