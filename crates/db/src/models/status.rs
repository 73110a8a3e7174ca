//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
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

            /// Map a database status ID back to its variant.
            pub fn from_id(id: StatusId) -> Option<Self> {
                $(
                    if id == $val {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Generation task lifecycle status.
    ///
    /// `Init -> Running -> {Success, Fail}`; the last two are terminal.
    TaskStatus {
        Init = 1,
        Running = 2,
        Success = 3,
        Fail = 4,
    }
}

impl TaskStatus {
    /// Statuses no transition may leave.
    pub const TERMINAL: [TaskStatus; 2] = [TaskStatus::Success, TaskStatus::Fail];

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_ids_match_seed_data() {
        assert_eq!(TaskStatus::Init.id(), 1);
        assert_eq!(TaskStatus::Running.id(), 2);
        assert_eq!(TaskStatus::Success.id(), 3);
        assert_eq!(TaskStatus::Fail.id(), 4);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = TaskStatus::Running.into();
        assert_eq!(id, 2);
    }

    #[test]
    fn from_id_round_trips_known_ids() {
        for status in [
            TaskStatus::Init,
            TaskStatus::Running,
            TaskStatus::Success,
            TaskStatus::Fail,
        ] {
            assert_eq!(TaskStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(TaskStatus::from_id(0), None);
        assert_eq!(TaskStatus::from_id(9), None);
    }

    #[test]
    fn only_success_and_fail_are_terminal() {
        assert!(!TaskStatus::Init.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Fail.is_terminal());
    }
}
