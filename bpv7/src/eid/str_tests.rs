use super::*;

#[test]
fn dtn_none_parses() {
    assert_eq!("dtn:none".parse::<Eid>().unwrap(), Eid::Null);
}

#[test]
fn dtn_ssp_parses() {
    assert_eq!(
        "dtn://node/service".parse::<Eid>().unwrap(),
        Eid::Dtn("//node/service".to_string())
    );
}

#[test]
fn empty_dtn_ssp_is_rejected() {
    assert!(matches!("dtn:".parse::<Eid>(), Err(EidError::EmptyDtnSsp)));
}

#[test]
fn ipn_parses() {
    assert_eq!(
        "ipn:42.7".parse::<Eid>().unwrap(),
        Eid::Ipn { node: 42, service: 7 }
    );
}

#[test]
fn ipn_with_extra_components_is_rejected() {
    assert!(matches!(
        "ipn:1.2.3".parse::<Eid>(),
        Err(EidError::InvalidIpnComponents)
    ));
}

#[test]
fn ipn_with_non_numeric_component_is_rejected() {
    assert!(matches!(
        "ipn:node.service".parse::<Eid>(),
        Err(EidError::InvalidField { field: "node number", .. })
    ));
}

#[test]
fn unknown_scheme_is_rejected() {
    assert!(matches!(
        "mailto:bob@example.com".parse::<Eid>(),
        Err(EidError::BadScheme(scheme)) if scheme == "mailto"
    ));
}

#[test]
fn missing_scheme_is_rejected() {
    assert!(matches!("not-a-uri".parse::<Eid>(), Err(EidError::MissingScheme)));
}

#[test]
fn display_round_trips_through_parse() {
    for eid in [
        Eid::Null,
        Eid::Dtn("//node/service".to_string()),
        Eid::Ipn { node: 42, service: 7 },
    ] {
        let s = eid.to_string();
        assert_eq!(s.parse::<Eid>().unwrap(), eid);
    }
}

#[test]
fn group_ssp_is_not_singleton() {
    assert!(!Eid::Dtn("//~group/topic".to_string()).is_singleton());
    assert!(Eid::Dtn("//node/service".to_string()).is_singleton());
    assert!(Eid::Null.is_singleton());
    assert!(Eid::Ipn { node: 1, service: 1 }.is_singleton());
}
