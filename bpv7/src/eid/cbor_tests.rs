use super::*;
use hex_literal::hex;

#[test]
fn ipn_round_trips() {
    let eid = Eid::Ipn { node: 42, service: 7 };
    let (bytes, ()) = dtncore_cbor::encode::emit(&eid);
    assert_eq!(bytes, hex!("82 02 82 18 2a 07"));

    let decoded = dtncore_cbor::decode::parse::<Eid>(&bytes).expect("failed to parse");
    assert_eq!(decoded, eid);
}

#[test]
fn dtn_none_round_trips() {
    let (bytes, ()) = dtncore_cbor::encode::emit(&Eid::Null);
    assert_eq!(bytes, hex!("82 01 00"));

    let decoded = dtncore_cbor::decode::parse::<Eid>(&bytes).expect("failed to parse");
    assert_eq!(decoded, Eid::Null);
}

#[test]
fn dtn_ssp_round_trips() {
    let eid = Eid::Dtn("//node/service".to_string());
    let (bytes, ()) = dtncore_cbor::encode::emit(&eid);
    let decoded = dtncore_cbor::decode::parse::<Eid>(&bytes).expect("failed to parse");
    assert_eq!(decoded, eid);
}

#[test]
fn empty_data_is_rejected() {
    assert!(matches!(
        dtncore_cbor::decode::parse::<Eid>(&[]).unwrap_err(),
        EidError::InvalidCbor(dtncore_cbor::decode::Error::NeedMoreData(1))
    ));
}

#[test]
fn unsupported_scheme_is_rejected() {
    let data = hex!("82 03 00");
    assert!(matches!(
        dtncore_cbor::decode::parse::<Eid>(&data).unwrap_err(),
        EidError::UnsupportedScheme(3)
    ));
}

#[test]
fn empty_dtn_text_ssp_is_rejected() {
    let data = hex!("82 01 60");
    assert!(matches!(
        dtncore_cbor::decode::parse::<Eid>(&data).unwrap_err(),
        EidError::EmptyDtnSsp
    ));
}

#[test]
fn non_zero_integer_dtn_ssp_is_rejected() {
    let data = hex!("82 01 01");
    assert!(matches!(
        dtncore_cbor::decode::parse::<Eid>(&data).unwrap_err(),
        EidError::InvalidDtnCborForm
    ));
}
