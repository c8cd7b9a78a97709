//! Wire protocol: method names, call arguments and reply tuples.
//!
//! Calls carry positional arguments and the authority answers with
//! positional tuples. This module is the only place that knows which
//! position means what; both the client and the authority adapters work
//! with the typed forms.

use serde_json::{json, Value};
use std::time::Duration;

use crate::caller::Reply;
use crate::error::{LocksmithError, Result};
use crate::lease::LeaseId;

/// Remote method performing a lease acquisition.
pub const ACQUIRE: &str = "locksmith:acquire";

/// Remote method extending an existing lease.
pub const UPDATE: &str = "locksmith:update";

/// Remote method releasing an existing lease.
pub const RELEASE: &str = "locksmith:release";

/// Remote method fetching authority-side counters.
pub const STATISTICS: &str = "locksmith:statistics";

/// Arguments of an acquire call.
///
/// `wait` is the third, optional argument: absent means block until
/// granted, zero means a single attempt, anything else is how long the
/// authority keeps trying before answering ungranted.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireArgs {
    pub name: String,
    pub validity: Duration,
    pub wait: Option<Duration>,
}

impl AcquireArgs {
    /// Encode into positional call arguments.
    pub fn encode(&self) -> Vec<Value> {
        let mut args = vec![json!(self.name), secs_value(self.validity)];
        if let Some(wait) = self.wait {
            args.push(secs_value(wait));
        }
        args
    }

    /// Decode positional call arguments, as an authority does.
    pub fn decode(args: &[Value]) -> Result<Self> {
        let name = arg_str(args, 0, "lock name")?.to_string();
        let validity = arg_validity(args, 1)?;
        let wait = match args.get(2) {
            None => None,
            Some(value) => {
                let secs = value.as_f64().ok_or_else(|| {
                    LocksmithError::Remote("malformed call: bad wait".to_string())
                })?;
                let wait = Duration::try_from_secs_f64(secs).map_err(|_| {
                    LocksmithError::Remote("wait must not be negative".to_string())
                })?;
                Some(wait)
            }
        };
        Ok(Self {
            name,
            validity,
            wait,
        })
    }
}

/// Arguments of an update call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateArgs {
    pub id: LeaseId,
    pub validity: Duration,
}

impl UpdateArgs {
    /// Encode into positional call arguments.
    pub fn encode(&self) -> Vec<Value> {
        vec![json!(self.id.as_str()), secs_value(self.validity)]
    }

    /// Decode positional call arguments, as an authority does.
    pub fn decode(args: &[Value]) -> Result<Self> {
        Ok(Self {
            id: LeaseId::from(arg_str(args, 0, "lease id")?),
            validity: arg_validity(args, 1)?,
        })
    }
}

/// Arguments of a release call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseArgs {
    pub id: LeaseId,
}

impl ReleaseArgs {
    /// Encode into positional call arguments.
    pub fn encode(&self) -> Vec<Value> {
        vec![json!(self.id.as_str())]
    }

    /// Decode positional call arguments, as an authority does.
    pub fn decode(args: &[Value]) -> Result<Self> {
        Ok(Self {
            id: LeaseId::from(arg_str(args, 0, "lease id")?),
        })
    }
}

/// A granted lease as reported by the authority.
#[derive(Debug, Clone, PartialEq)]
pub struct Granted {
    /// Lock name the lease is held under.
    pub name: String,

    /// Unique identifier of the lease.
    pub id: LeaseId,
}

/// Decode an acquire reply.
///
/// A grant carries the lease identifier, the lock name and the identifier
/// again at positions 0..=2; an ungranted attempt answers with a single
/// null. Anything else is a protocol violation.
pub fn decode_acquire(reply: &Reply) -> Result<Option<Granted>> {
    let tuple = first_tuple(reply)?;
    if tuple[0].is_null() {
        return Ok(None);
    }

    let name = string_at(tuple, 1, "lock name")?;
    let id = string_at(tuple, 2, "lease id")?;
    Ok(Some(Granted {
        name: name.to_string(),
        id: LeaseId::from(id),
    }))
}

/// Decode an update or release reply into an acknowledgement.
///
/// A non-null first element means the authority applied the operation; a
/// null means the lease was unknown or already expired.
pub fn decode_ack(reply: &Reply) -> Result<bool> {
    let tuple = first_tuple(reply)?;
    Ok(!tuple[0].is_null())
}

/// Decode a statistics reply.
///
/// The record is passed through untyped; its layout belongs to the
/// authority and is subject to change.
pub fn decode_statistics(reply: &Reply) -> Result<Value> {
    let tuple = first_tuple(reply)?;
    Ok(tuple[0].clone())
}

/// Encode a granted acquire reply.
pub fn granted(name: &str, id: &LeaseId) -> Reply {
    Reply::new(vec![vec![
        Value::String(id.to_string()),
        Value::String(name.to_string()),
        Value::String(id.to_string()),
    ]])
}

/// Encode an ungranted acquire reply.
pub fn ungranted() -> Reply {
    Reply::new(vec![vec![Value::Null]])
}

/// Encode an update/release acknowledgement reply.
pub fn ack(id: Option<&LeaseId>) -> Reply {
    let head = match id {
        Some(id) => Value::String(id.to_string()),
        None => Value::Null,
    };
    Reply::new(vec![vec![head]])
}

/// Encode a statistics reply.
pub fn statistics(record: Value) -> Reply {
    Reply::new(vec![vec![record]])
}

fn secs_value(duration: Duration) -> Value {
    json!(duration.as_secs_f64())
}

fn arg_str<'a>(args: &'a [Value], index: usize, what: &str) -> Result<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| LocksmithError::Remote(format!("malformed call: missing {}", what)))
}

fn arg_validity(args: &[Value], index: usize) -> Result<Duration> {
    let secs = args
        .get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| LocksmithError::Remote("malformed call: missing validity".to_string()))?;
    if secs <= 0.0 {
        return Err(LocksmithError::Remote("validity must be positive".to_string()));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| LocksmithError::Remote("validity must be positive".to_string()))
}

fn first_tuple(reply: &Reply) -> Result<&[Value]> {
    let tuple = reply
        .first()
        .ok_or_else(|| LocksmithError::BadReply("authority returned no tuples".to_string()))?;
    if tuple.is_empty() {
        return Err(LocksmithError::BadReply(
            "authority returned an empty tuple".to_string(),
        ));
    }
    Ok(tuple)
}

fn string_at<'a>(tuple: &'a [Value], index: usize, what: &str) -> Result<&'a str> {
    tuple.get(index).and_then(Value::as_str).ok_or_else(|| {
        LocksmithError::BadReply(format!("grant tuple missing {} at position {}", what, index))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_args_without_wait() {
        let args = AcquireArgs {
            name: "orders".to_string(),
            validity: Duration::from_secs(30),
            wait: None,
        };
        assert_eq!(args.encode(), vec![json!("orders"), json!(30.0)]);
        assert_eq!(AcquireArgs::decode(&args.encode()).unwrap(), args);
    }

    #[test]
    fn test_acquire_args_with_wait() {
        let args = AcquireArgs {
            name: "orders".to_string(),
            validity: Duration::from_secs(30),
            wait: Some(Duration::from_millis(1500)),
        };
        assert_eq!(
            args.encode(),
            vec![json!("orders"), json!(30.0), json!(1.5)]
        );
        assert_eq!(AcquireArgs::decode(&args.encode()).unwrap(), args);
    }

    #[test]
    fn test_acquire_args_reject_non_positive_validity() {
        let err = AcquireArgs::decode(&[json!("orders"), json!(0.0)]).unwrap_err();
        assert!(matches!(err, LocksmithError::Remote(ref m) if m.contains("validity")));
    }

    #[test]
    fn test_acquire_args_reject_negative_wait() {
        let err =
            AcquireArgs::decode(&[json!("orders"), json!(30.0), json!(-1.0)]).unwrap_err();
        assert!(matches!(err, LocksmithError::Remote(ref m) if m.contains("wait")));
    }

    #[test]
    fn test_acquire_args_reject_missing_name() {
        assert!(AcquireArgs::decode(&[]).is_err());
        assert!(AcquireArgs::decode(&[json!(7), json!(30.0)]).is_err());
    }

    #[test]
    fn test_update_args_round_trip() {
        let args = UpdateArgs {
            id: LeaseId::from("u-1"),
            validity: Duration::from_secs(30),
        };
        assert_eq!(args.encode(), vec![json!("u-1"), json!(30.0)]);
        assert_eq!(UpdateArgs::decode(&args.encode()).unwrap(), args);
    }

    #[test]
    fn test_release_args_round_trip() {
        let args = ReleaseArgs {
            id: LeaseId::from("u-1"),
        };
        assert_eq!(args.encode(), vec![json!("u-1")]);
        assert_eq!(ReleaseArgs::decode(&args.encode()).unwrap(), args);
    }

    #[test]
    fn test_decode_granted_acquire() {
        let reply = Reply::new(vec![vec![json!("u-1"), json!("orders"), json!("u-1")]]);
        let grant = decode_acquire(&reply).unwrap().unwrap();
        assert_eq!(grant.name, "orders");
        assert_eq!(grant.id.as_str(), "u-1");
    }

    #[test]
    fn test_decode_ungranted_acquire() {
        let reply = Reply::new(vec![vec![Value::Null]]);
        assert!(decode_acquire(&reply).unwrap().is_none());
    }

    #[test]
    fn test_decode_acquire_rejects_truncated_grant() {
        let reply = Reply::new(vec![vec![json!("u-1"), json!("orders")]]);
        let err = decode_acquire(&reply).unwrap_err();
        assert!(matches!(err, LocksmithError::BadReply(_)));
    }

    #[test]
    fn test_decode_acquire_rejects_non_string_grant() {
        let reply = Reply::new(vec![vec![json!(1), json!(2), json!(3)]]);
        assert!(decode_acquire(&reply).is_err());
    }

    #[test]
    fn test_decode_ack() {
        assert!(decode_ack(&ack(Some(&LeaseId::from("u-1")))).unwrap());
        assert!(!decode_ack(&ack(None)).unwrap());
    }

    #[test]
    fn test_empty_reply_is_a_protocol_violation() {
        let empty = Reply::new(Vec::new());
        assert!(decode_acquire(&empty).is_err());
        assert!(decode_ack(&empty).is_err());
        assert!(decode_statistics(&empty).is_err());
    }

    #[test]
    fn test_empty_tuple_is_a_protocol_violation() {
        let hollow = Reply::new(vec![Vec::new()]);
        assert!(decode_ack(&hollow).is_err());
    }

    #[test]
    fn test_statistics_record_passes_through_untyped() {
        let record = json!({"locks": 3, "acquired": 17});
        let reply = statistics(record.clone());
        assert_eq!(decode_statistics(&reply).unwrap(), record);
    }
}
