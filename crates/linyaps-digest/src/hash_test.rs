// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use rstest::rstest;

use super::Digest;

#[rstest]
fn test_partial_digest_empty() {
    assert!(
        super::PartialDigest::parse("").is_err(),
        "empty string is not a valid partial digest"
    )
}

#[rstest]
#[case("aa")]
#[case("bb1f")]
#[case("ccaa1234")]
#[should_panic]
#[case("cca")] // must be multiple of two
fn test_partial_digest_parse(#[case] src: &str) {
    let partial = super::PartialDigest::parse(src).expect("should be valid partial digest");
    let other = partial.to_string().parse().expect("re-parse same partial");
    assert_eq!(partial, other, "should survive a round-trip encoding");
}

#[rstest]
fn test_digest_round_trip() {
    let digest = Digest::from_reader(b"hello world".as_slice()).unwrap();
    let text = digest.to_string();
    let parsed: Digest = text.parse().expect("digest should re-parse");
    assert_eq!(digest, parsed);
}

#[rstest]
fn test_digest_known_value() {
    // sha256("") is a well-known constant, used as our EMPTY_DIGEST
    let digest = Digest::from_reader(b"".as_slice()).unwrap();
    assert_eq!(
        digest.to_string(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(digest.into_bytes(), super::EMPTY_DIGEST);
}
