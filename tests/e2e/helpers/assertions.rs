use hyper::header::HeaderMap;
use readaloud_backend::domain::audio::{decode, AudioFormat};

/// Headers every successful narration response carries
pub fn assert_narration_headers(headers: &HeaderMap) {
    for name in [
        "content-type",
        "x-chunk-count",
        "x-chunks-completed",
        "x-language",
        "x-backends-used",
        "x-start-offset",
        "x-end-offset",
        "x-request-id",
    ] {
        assert!(headers.contains_key(name), "Missing {} header", name);
    }
}

/// The body is MP3 that decodes to some audio
pub fn assert_mp3(body: &[u8]) {
    assert_eq!(AudioFormat::sniff(body), Some(AudioFormat::Mp3), "Audio body is not MP3");
    let pcm = decode(body).expect("Audio body does not decode");
    assert!(pcm.frames() > 0, "Audio body decodes to silence of zero length");
}
