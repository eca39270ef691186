// Tests for the wire codec: base64 transport encoding and PCM16 packing.

use voicelink::audio::codec;
use voicelink::Error;

#[test]
fn test_encode_decode_round_trip() {
    let cases: Vec<Vec<u8>> = vec![
        vec![],
        vec![0x00],
        vec![0xFF],
        vec![0x01, 0x02, 0x03, 0x04, 0x05],
        (0..=255u8).collect(),
        vec![0xAB; 64 * 1024], // a large chunk
    ];

    for raw in cases {
        let text = codec::encode(&raw);
        let back = codec::decode(&text).expect("decode of encoded data must succeed");
        assert_eq!(back, raw);
    }
}

#[test]
fn test_decode_rejects_malformed_input() {
    let result = codec::decode("not/valid base64!!!");
    assert!(matches!(result, Err(Error::Codec(_))));
}

#[test]
fn test_pack_pcm16_is_little_endian() {
    // 0.5 * 32768 = 16384 = 0x4000
    let bytes = codec::pack_pcm16(&[0.5]);
    assert_eq!(bytes, vec![0x00, 0x40]);

    // -1.0 * 32768 = -32768 = 0x8000
    let bytes = codec::pack_pcm16(&[-1.0]);
    assert_eq!(bytes, vec![0x00, 0x80]);
}

#[test]
fn test_pack_pcm16_saturates_at_full_scale() {
    // +1.0 would wrap to -32768 without clamping; it must saturate instead.
    let bytes = codec::pack_pcm16(&[1.0, 2.0]);
    assert_eq!(&bytes[0..2], &i16::MAX.to_le_bytes());
    assert_eq!(&bytes[2..4], &i16::MAX.to_le_bytes());

    let bytes = codec::pack_pcm16(&[-2.0]);
    assert_eq!(&bytes[0..2], &i16::MIN.to_le_bytes());
}

#[test]
fn test_unpack_pcm16_inverts_pack_within_quantization() {
    let samples = vec![0.0, 0.25, -0.25, 0.9, -0.9];
    let packed = codec::pack_pcm16(&samples);
    let unpacked = codec::unpack_pcm16(&packed);

    assert_eq!(unpacked.len(), samples.len());
    for (a, b) in samples.iter().zip(unpacked.iter()) {
        assert!((a - b).abs() < 1.0 / 32768.0, "{a} vs {b}");
    }
}

#[test]
fn test_unpack_pcm16_ignores_odd_trailing_byte() {
    let samples = codec::unpack_pcm16(&[0x00, 0x40, 0x7F]);
    assert_eq!(samples.len(), 1);
}

#[test]
fn test_empty_payload_round_trip() {
    assert_eq!(codec::encode(&[]), "");
    assert_eq!(codec::decode("").unwrap(), Vec::<u8>::new());
    assert!(codec::pack_pcm16(&[]).is_empty());
    assert!(codec::unpack_pcm16(&[]).is_empty());
}
