// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Compact side tables of a compiled method. Both use unsigned LEB128.

fn emit_varuint(out: &mut Vec<u8>, mut value: usize) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Code length, then the safepoints: the return address offset of every
/// call, delta encoded.
#[must_use]
pub fn encode_gc_info(code_length: usize, call_sites: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    emit_varuint(&mut out, code_length);
    emit_varuint(&mut out, call_sites.len());

    let mut previous = 0;
    for site in call_sites {
        debug_assert!(*site >= previous, "call sites must be ascending");
        emit_varuint(&mut out, site - previous);
        previous = *site;
    }

    out
}

/// The offsets of the throwing calls. A throw leaves the method, so there
/// are no handler regions to describe.
#[must_use]
pub fn encode_eh_info(throw_sites: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    emit_varuint(&mut out, throw_sites.len());
    for site in throw_sites {
        emit_varuint(&mut out, *site);
    }
    out
}
