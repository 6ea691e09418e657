//! Instance status enum mapping to the `instance_statuses` lookup table.
//!
//! Each variant's discriminant matches the seed data order (1-based) of the
//! lookup table, so rows store a `SMALLINT status_id`.

use serde::{Serialize, Serializer};

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Lower-case name as stored in the lookup table.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl TryFrom<StatusId> for $name {
            type Error = String;

            fn try_from(value: StatusId) -> Result<Self, Self::Error> {
                Self::from_id(value).ok_or_else(|| {
                    format!("unknown {} id {value}", stringify!($name))
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Instance lifecycle status.
    ///
    /// `Creating -> Running <-> Stopped`, any non-terminal status may move to
    /// `Failed`. Deletion is not a status: the row leaves the live table.
    InstanceStatus {
        Creating = 1 => "creating",
        Running = 2 => "running",
        Stopped = 3 => "stopped",
        Failed = 4 => "failed",
    }
}

impl InstanceStatus {
    /// Whether moving from `self` to `next` is a legal lifecycle transition.
    ///
    /// Nothing re-enters `Creating`, and `Failed` is terminal.
    pub fn can_transition_to(self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;
        matches!(
            (self, next),
            (Creating, Running)
                | (Running, Stopped)
                | (Stopped, Running)
                | (Running, Running)
                | (Creating | Running | Stopped, Failed)
        )
    }

    /// Whether start, stop and restart may act on an instance in this
    /// status. `Creating` is owned by the in-flight `Create` and `Failed` is
    /// terminal.
    pub fn accepts_power_actions(self) -> bool {
        matches!(self, InstanceStatus::Running | InstanceStatus::Stopped)
    }

    /// Whether an instance in this status may be archived and removed.
    ///
    /// An instance still being created is owned by the in-flight `Create`.
    pub fn is_deletable(self) -> bool {
        !matches!(self, InstanceStatus::Creating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_lookup() {
        for status in [
            InstanceStatus::Creating,
            InstanceStatus::Running,
            InstanceStatus::Stopped,
            InstanceStatus::Failed,
        ] {
            assert_eq!(InstanceStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(InstanceStatus::from_id(0), None);
        assert!(InstanceStatus::try_from(9).is_err());
    }

    #[test]
    fn creating_is_never_reentered() {
        for from in [
            InstanceStatus::Running,
            InstanceStatus::Stopped,
            InstanceStatus::Failed,
        ] {
            assert!(!from.can_transition_to(InstanceStatus::Creating));
        }
    }

    #[test]
    fn failed_is_terminal() {
        assert!(!InstanceStatus::Failed.can_transition_to(InstanceStatus::Running));
        assert!(!InstanceStatus::Failed.can_transition_to(InstanceStatus::Stopped));
    }

    #[test]
    fn creating_cannot_skip_to_stopped() {
        assert!(!InstanceStatus::Creating.can_transition_to(InstanceStatus::Stopped));
        assert!(InstanceStatus::Creating.can_transition_to(InstanceStatus::Running));
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&InstanceStatus::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
    }

    #[test]
    fn power_actions_need_a_settled_status() {
        assert!(InstanceStatus::Running.accepts_power_actions());
        assert!(InstanceStatus::Stopped.accepts_power_actions());
        assert!(!InstanceStatus::Creating.accepts_power_actions());
        assert!(!InstanceStatus::Failed.accepts_power_actions());
    }

    #[test]
    fn only_creating_blocks_deletion() {
        assert!(!InstanceStatus::Creating.is_deletable());
        assert!(InstanceStatus::Failed.is_deletable());
        assert!(InstanceStatus::Running.is_deletable());
    }
}
