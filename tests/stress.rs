//! Feeds a single multipart body through the parser split into every "interesting" chunk
//! size, checking that the recovered field values are identical regardless of how the body
//! was chunked. The notion of "interesting" chunk size is carried over from
//! `test_parser_stress.py`'s `is_interesting_number`: primes, powers of two and ten (and their
//! neighbors), multiples of 1000/1024 (and their neighbors), and perfect squares, up to a
//! fixed ceiling. Exhaustively trying every chunk size from 1 to the ceiling would be
//! prohibitively slow; the interesting numbers are where off-by-one boundary bugs live.
use streaming_multipart::{MultipartParser, ValueTarget};

const CEILING: usize = 4100;

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

fn is_power_of(mut n: usize, base: usize) -> bool {
    if n == 0 {
        return false;
    }
    while n > 1 {
        if n % base != 0 {
            return false;
        }
        n /= base;
    }
    true
}

fn is_square(n: usize) -> bool {
    let sq = (n as f64).sqrt() as usize;
    (sq * sq == n) || ((sq + 1) * (sq + 1) == n)
}

fn is_multiple(n: usize, base: usize) -> bool {
    n % base == 0
}

fn is_interesting_number(n: usize) -> bool {
    is_prime(n)
        || is_power_of(n, 2)
        || (n > 0 && is_power_of(n - 1, 2))
        || is_power_of(n + 1, 2)
        || is_power_of(n, 10)
        || (n > 0 && is_power_of(n - 1, 10))
        || is_power_of(n + 1, 10)
        || is_multiple(n, 1024)
        || (n > 0 && is_multiple(n - 1, 1024))
        || is_multiple(n + 1, 1024)
        || is_multiple(n, 1000)
        || (n > 0 && is_multiple(n - 1, 1000))
        || is_multiple(n + 1, 1000)
        || is_square(n)
}

fn interesting_chunk_sizes(ceiling: usize) -> Vec<usize> {
    (1..=ceiling).filter(|&n| is_interesting_number(n)).collect()
}

fn build_body(name_payload: &[u8], file_payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"--X\r\n");
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"name\"\r\n\r\n");
    body.extend_from_slice(name_payload);
    body.extend_from_slice(b"\r\n--X\r\n");
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"f.dat\"\r\n");
    body.extend_from_slice(b"Content-Type: binary/octet-stream\r\n\r\n");
    body.extend_from_slice(file_payload);
    body.extend_from_slice(b"\r\n--X--\r\n");
    body
}

fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    // xorshift64*, deterministic across runs; good enough to exercise every byte value and
    // incidentally produce CRLF-lookalike runs inside the payload.
    let mut state = seed | 1;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        out.push((state >> 24) as u8);
    }
    out
}

fn parse_with_chunk_size(body: &[u8], chunk_size: usize) -> (Vec<u8>, Vec<u8>) {
    let mut name = ValueTarget::new();
    let mut file = ValueTarget::new();
    let mut parser = MultipartParser::new("X").unwrap();
    parser.register("name", &mut name).unwrap();
    parser.register("file", &mut file).unwrap();

    for chunk in body.chunks(chunk_size.max(1)) {
        parser.push(chunk).unwrap();
    }
    parser.eof().unwrap();

    (name.into_value(), file.into_value())
}

#[test]
fn chunk_partition_does_not_affect_recovered_fields() {
    let file_payload = pseudo_random_bytes(9001, 59);
    let body = build_body(b"hello world", &file_payload);

    let (expected_name, expected_file) = parse_with_chunk_size(&body, body.len());
    assert_eq!(expected_name, b"hello world");
    assert_eq!(expected_file, file_payload);

    let mut checked = 0;
    for chunk_size in interesting_chunk_sizes(CEILING) {
        let (name, file) = parse_with_chunk_size(&body, chunk_size);
        assert_eq!(name, expected_name, "chunk_size={}", chunk_size);
        assert_eq!(file, expected_file, "chunk_size={}", chunk_size);
        checked += 1;
    }

    assert!(checked > 50, "expected a healthy number of interesting chunk sizes, got {}", checked);
}

#[test]
fn single_byte_chunks_recover_fields_exactly() {
    let file_payload = pseudo_random_bytes(500, 7);
    let body = build_body(b"x", &file_payload);

    let (name, file) = parse_with_chunk_size(&body, 1);
    assert_eq!(name, b"x");
    assert_eq!(file, file_payload);
}

#[test]
fn payload_containing_boundary_lookalikes_is_not_misdetected() {
    // A payload containing `--X` without a preceding CRLF must pass through untouched.
    let file_payload = b"prefix--Xsuffix--X--more".to_vec();
    let body = build_body(b"n", &file_payload);

    let (name, file) = parse_with_chunk_size(&body, 3);
    assert_eq!(name, b"n");
    assert_eq!(file, file_payload);
}
