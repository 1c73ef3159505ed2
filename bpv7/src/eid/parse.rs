use super::*;
use error::{CaptureFieldErr, EidError};

fn ipn_from_str(s: &str) -> Result<Eid, EidError> {
    let Some((node, service)) = s.split_once('.') else {
        return Err(EidError::InvalidIpnComponents);
    };
    if node.contains('.') || service.contains('.') {
        return Err(EidError::InvalidIpnComponents);
    }
    Ok(Eid::Ipn {
        node: node.parse().map_field_err("node number")?,
        service: service.parse().map_field_err("service number")?,
    })
}

impl std::str::FromStr for Eid {
    type Err = EidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(s) = s.strip_prefix("dtn:") {
            if s == "none" {
                Ok(Eid::Null)
            } else if s.is_empty() {
                Err(EidError::EmptyDtnSsp)
            } else {
                Ok(Eid::Dtn(s.to_string()))
            }
        } else if let Some(s) = s.strip_prefix("ipn:") {
            ipn_from_str(s)
        } else if let Some((scheme, _)) = s.split_once(':') {
            Err(EidError::BadScheme(scheme.to_string()))
        } else {
            Err(EidError::MissingScheme)
        }
    }
}

pub(super) fn eid_from_cbor(data: &[u8]) -> Result<(Eid, bool, usize), EidError> {
    dtncore_cbor::decode::parse_array(data, |a, mut shortest, tags| {
        shortest = shortest && tags.is_empty() && a.is_definite();
        let (scheme, s): (u64, bool) = a.parse().map_field_err("scheme")?;
        shortest = shortest && s;

        match scheme {
            1 => {
                let ((eid, s), _) = a.parse_value(|value, s, tags| match value {
                    dtncore_cbor::decode::Value::UnsignedInteger(0) => Ok((Eid::Null, s && tags.is_empty())),
                    dtncore_cbor::decode::Value::Text(ssp) if !ssp.is_empty() => {
                        Ok((Eid::Dtn(ssp.to_string()), s && tags.is_empty()))
                    }
                    dtncore_cbor::decode::Value::Text(_) => Err(EidError::EmptyDtnSsp),
                    _ => Err(EidError::InvalidDtnCborForm),
                })?;
                Ok((eid, shortest && s))
            }
            2 => {
                let (((node, service), s), _) = a.parse_array(|a, s, tags| {
                    let (node, sn): (u64, bool) = a.parse().map_field_err("node number")?;
                    let (service, ss): (u64, bool) = a.parse().map_field_err("service number")?;
                    Ok::<_, EidError>(((node, service), s && tags.is_empty() && sn && ss))
                })?;
                Ok((Eid::Ipn { node, service }, shortest && s))
            }
            scheme => Err(EidError::UnsupportedScheme(scheme)),
        }
    })
    .map(|((eid, shortest), len)| (eid, shortest, len))
}
