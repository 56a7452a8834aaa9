//! Fuzz target for decoding resolver daemon replies.
//!
//! Run with: cargo +nightly fuzz run fuzz_varlink_reply
//!
//! Feeds arbitrary bytes through the reply envelope and every typed
//! parameter shape the components decode.

#![no_main]

use avahi_compat_core::varlink::connection::decode_parameters;
use avahi_compat_core::varlink::{
    BrowseServicesReply, Reply, ResolveRecordReply, ResolveServiceReply,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(reply) = serde_json::from_slice::<Reply>(data) else {
        return;
    };
    let Ok(parameters) = reply.into_result() else {
        return;
    };
    let _ = decode_parameters::<BrowseServicesReply>(parameters.clone());
    let _ = decode_parameters::<ResolveServiceReply>(parameters.clone());
    let _ = decode_parameters::<ResolveRecordReply>(parameters);
});
