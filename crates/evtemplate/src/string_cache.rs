/*
 * string_cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Process-wide cache of JSON-encoded property names.
//!
//! Structures tend to repeat the same member names on every event, so the
//! quoted and escaped form of each short name is computed once and shared.
//! The cache only ever grows; entries are immutable once inserted.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::json::write_quoted_json_string;
use crate::writer::Utf8Writer;

/// Names longer than this are encoded on every use instead of cached.
pub const MAX_CACHED_NAME_LEN: usize = 64;

static QUOTED_NAMES: Lazy<RwLock<HashMap<String, Arc<[u8]>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The quoted, escaped JSON encoding of `name`, e.g. `"Name"`.
pub fn quoted_json_name(name: &str) -> Arc<[u8]> {
    if let Some(cached) = QUOTED_NAMES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
    {
        return Arc::clone(cached);
    }

    let encoded = encode(name);
    if name.len() <= MAX_CACHED_NAME_LEN {
        let mut names = QUOTED_NAMES.write().unwrap_or_else(PoisonError::into_inner);
        return Arc::clone(names.entry(name.to_string()).or_insert(encoded));
    }
    encoded
}

/// Write the quoted name, using the cache for short names.
pub fn write_json_name(name: &str, out: &mut Utf8Writer<'_>) {
    if name.len() <= MAX_CACHED_NAME_LEN {
        out.write(&quoted_json_name(name));
    } else {
        write_quoted_json_string(name, out);
    }
}

fn encode(name: &str) -> Arc<[u8]> {
    let mut buf = Vec::with_capacity(name.len() + 2);
    {
        let mut out = Utf8Writer::new(&mut buf);
        write_quoted_json_string(name, &mut out);
    }
    Arc::from(buf)
}
