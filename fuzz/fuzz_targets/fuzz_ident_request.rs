#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any request line must yield exactly one CRLF-terminated reply
    let line = String::from_utf8_lossy(data);
    let reply = identd::ident::protocol::respond(&line, |_| {
        identd::ident::protocol::IdentReply::user_id("UNIX", "fuzz")
    });
    assert!(reply.ends_with("\r\n"));
    if let Ok(ports) = identd::ident::protocol::parse_request(&line) {
        assert!(ports.local != 0 && ports.remote != 0);
    }
});
