//! Percent-decoding and percent-encoding over caller-provided buffers.
//!
//! Both transforms copy 16-byte runs that need no rewriting in one step and
//! fall back to a byte loop around anything that does. They never allocate;
//! the destination must be large enough (the input length for [`decode`],
//! three times the input length for [`encode`]). A NUL terminator is written
//! after the output whenever the destination has room for it.

/// Width of one vector chunk.
pub const LANES: usize = 16;

const INVALID: u8 = 0xFF;
const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

static HEX_VALUE: [u8; 256] = hex_value_table();
static URL_SAFE: [bool; 256] = url_safe_table();

const fn hex_value_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < 256 {
        let b = i as u8;
        table[i] = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => INVALID,
        };
        i += 1;
    }
    table
}

const fn url_safe_table() -> [bool; 256] {
    let mut table = [false; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = matches!(
            i as u8,
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'!'
        );
        i += 1;
    }
    table
}

/// Whether `b` is copied verbatim by [`encode`].
#[inline]
pub fn is_url_safe(b: u8) -> bool {
    URL_SAFE[b as usize]
}

/// Upper bound on the bytes [`encode`] writes for `len` input bytes.
pub const fn encoded_len_upper_bound(len: usize) -> usize {
    len * 3
}

/// Decodes `%XX` escapes and `+` into `dst`, returning the decoded length.
///
/// A `%` that is not followed by two hex digits is copied through literally.
pub fn decode(src: &[u8], dst: &mut [u8]) -> usize {
    let mut i = 0;
    let mut out = 0;

    while i < src.len() {
        if src.len() - i >= LANES {
            let run = lanes::first_of_either(&src[i..i + LANES], b'%', b'+').unwrap_or(LANES);
            if run > 0 {
                dst[out..out + run].copy_from_slice(&src[i..i + run]);
                i += run;
                out += run;
                continue;
            }
        }

        match src[i] {
            b'%' if i + 2 < src.len() => {
                let hi = HEX_VALUE[src[i + 1] as usize];
                let lo = HEX_VALUE[src[i + 2] as usize];
                if hi != INVALID && lo != INVALID {
                    dst[out] = (hi << 4) | lo;
                    i += 3;
                } else {
                    dst[out] = b'%';
                    i += 1;
                }
            }
            b'+' => {
                dst[out] = b' ';
                i += 1;
            }
            b => {
                dst[out] = b;
                i += 1;
            }
        }
        out += 1;
    }

    terminate(dst, out);
    out
}

/// Percent-encodes `src` into `dst`, returning the encoded length.
///
/// Letters, digits and `-_.~!` are copied, space becomes `+`, every other
/// byte becomes `%` followed by two uppercase hex digits.
pub fn encode(src: &[u8], dst: &mut [u8]) -> usize {
    let mut i = 0;
    let mut out = 0;

    while i < src.len() {
        if src.len() - i >= LANES {
            let run = lanes::first_unsafe(&src[i..i + LANES]);
            if run > 0 {
                dst[out..out + run].copy_from_slice(&src[i..i + run]);
                i += run;
                out += run;
                continue;
            }
        }

        let b = src[i];
        i += 1;
        if b == b' ' {
            dst[out] = b'+';
            out += 1;
        } else if is_url_safe(b) {
            dst[out] = b;
            out += 1;
        } else {
            dst[out] = b'%';
            dst[out + 1] = HEX_DIGITS[(b >> 4) as usize];
            dst[out + 2] = HEX_DIGITS[(b & 0x0F) as usize];
            out += 3;
        }
    }

    terminate(dst, out);
    out
}

/// Position of the first `needle` in `haystack`, scanning 16 bytes at a time.
pub fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    let mut offset = 0;
    while haystack.len() - offset >= LANES {
        if let Some(pos) = lanes::first_of(&haystack[offset..offset + LANES], needle) {
            return Some(offset + pos);
        }
        offset += LANES;
    }
    haystack[offset..]
        .iter()
        .position(|&b| b == needle)
        .map(|pos| offset + pos)
}

#[inline]
fn terminate(dst: &mut [u8], len: usize) {
    if let Some(b) = dst.get_mut(len) {
        *b = 0;
    }
}

#[cfg(target_arch = "x86_64")]
mod lanes {
    use core::arch::x86_64::*;

    use super::LANES;

    #[inline]
    fn load(chunk: &[u8]) -> __m128i {
        assert!(chunk.len() >= LANES);
        // SAFETY: the slice holds at least 16 bytes and the load is unaligned.
        unsafe { _mm_loadu_si128(chunk.as_ptr().cast::<__m128i>()) }
    }

    #[inline]
    fn first_set(mask: i32) -> Option<usize> {
        (mask != 0).then(|| mask.trailing_zeros() as usize)
    }

    pub(super) fn first_of(chunk: &[u8], a: u8) -> Option<usize> {
        let v = load(chunk);
        // SAFETY: SSE2 is part of the x86_64 baseline.
        let mask = unsafe { _mm_movemask_epi8(_mm_cmpeq_epi8(v, _mm_set1_epi8(a as i8))) };
        first_set(mask)
    }

    pub(super) fn first_of_either(chunk: &[u8], a: u8, b: u8) -> Option<usize> {
        let v = load(chunk);
        // SAFETY: SSE2 is part of the x86_64 baseline.
        let mask = unsafe {
            let hits = _mm_or_si128(
                _mm_cmpeq_epi8(v, _mm_set1_epi8(a as i8)),
                _mm_cmpeq_epi8(v, _mm_set1_epi8(b as i8)),
            );
            _mm_movemask_epi8(hits)
        };
        first_set(mask)
    }

    /// Index of the first byte `encode` must rewrite, or 16 if there is none.
    pub(super) fn first_unsafe(chunk: &[u8]) -> usize {
        let v = load(chunk);
        // SAFETY: SSE2 is part of the x86_64 baseline. Bytes >= 0x80 compare
        // negative and so fall outside every (positive) range below.
        let mask = unsafe {
            let in_range = |lo: u8, hi: u8| {
                _mm_and_si128(
                    _mm_cmpgt_epi8(v, _mm_set1_epi8(lo as i8 - 1)),
                    _mm_cmplt_epi8(v, _mm_set1_epi8(hi as i8 + 1)),
                )
            };
            let eq = |c: u8| _mm_cmpeq_epi8(v, _mm_set1_epi8(c as i8));

            let alnum = _mm_or_si128(
                _mm_or_si128(in_range(b'a', b'z'), in_range(b'A', b'Z')),
                in_range(b'0', b'9'),
            );
            let marks = _mm_or_si128(
                _mm_or_si128(_mm_or_si128(eq(b'-'), eq(b'_')), _mm_or_si128(eq(b'.'), eq(b'~'))),
                eq(b'!'),
            );
            _mm_movemask_epi8(_mm_or_si128(alnum, marks))
        };
        let unsafe_mask = !mask & 0xFFFF;
        first_set(unsafe_mask).unwrap_or(LANES)
    }
}

#[cfg(not(target_arch = "x86_64"))]
mod lanes {
    use super::{is_url_safe, LANES};

    pub(super) fn first_of(chunk: &[u8], a: u8) -> Option<usize> {
        chunk[..LANES].iter().position(|&c| c == a)
    }

    pub(super) fn first_of_either(chunk: &[u8], a: u8, b: u8) -> Option<usize> {
        chunk[..LANES].iter().position(|&c| c == a || c == b)
    }

    pub(super) fn first_unsafe(chunk: &[u8]) -> usize {
        chunk[..LANES]
            .iter()
            .position(|&c| !is_url_safe(c))
            .unwrap_or(LANES)
    }
}
