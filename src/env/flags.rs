//! Access flags and their translation to host open modes

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::{HostKvError, Result};
use crate::host::HostMode;

/// File access flags, combined with `|`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessFlags(u32);

impl AccessFlags {
    pub const READ: AccessFlags = AccessFlags(1);
    pub const WRITE: AccessFlags = AccessFlags(1 << 1);
    pub const READ_WRITE: AccessFlags = AccessFlags(1 << 2);
    pub const CREATE: AccessFlags = AccessFlags(1 << 3);
    pub const EXCLUSIVE: AccessFlags = AccessFlags(1 << 4);
    pub const TRUNCATE: AccessFlags = AccessFlags(1 << 5);
    pub const APPEND: AccessFlags = AccessFlags(1 << 6);

    const ALL: u32 = (1 << 7) - 1;

    pub const fn empty() -> Self {
        AccessFlags(0)
    }

    /// Build from a raw bitmask, rejecting unknown bits
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::ALL != 0 {
            return Err(HostKvError::InvalidParameter(format!(
                "unknown access flag bits {:#x}",
                bits & !Self::ALL
            )));
        }
        Ok(AccessFlags(bits))
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: AccessFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Host open mode for these flags.
    ///
    /// | flags                    | mode       |
    /// |--------------------------|------------|
    /// | READ                     | Read       |
    /// | WRITE + TRUNCATE         | Write      |
    /// | WRITE                    | ReadWrite  |
    /// | READ_WRITE + TRUNCATE    | WriteRead  |
    /// | READ_WRITE               | ReadWrite  |
    /// | anything else            | ReadWrite  |
    ///
    /// READ and WRITE together count as READ_WRITE.
    pub fn translate(&self) -> HostMode {
        let truncate = self.contains(Self::TRUNCATE);
        let read_write = self.contains(Self::READ_WRITE)
            || (self.contains(Self::READ) && self.contains(Self::WRITE));

        if read_write {
            if truncate {
                HostMode::WriteRead
            } else {
                HostMode::ReadWrite
            }
        } else if self.contains(Self::WRITE) {
            if truncate {
                HostMode::Write
            } else {
                // The host cannot open write-only without truncating
                HostMode::ReadWrite
            }
        } else if self.contains(Self::READ) {
            HostMode::Read
        } else {
            HostMode::ReadWrite
        }
    }
}

impl BitOr for AccessFlags {
    type Output = AccessFlags;

    fn bitor(self, rhs: AccessFlags) -> AccessFlags {
        AccessFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessFlags {
    fn bitor_assign(&mut self, rhs: AccessFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(AccessFlags, &str); 7] = [
            (AccessFlags::READ, "READ"),
            (AccessFlags::WRITE, "WRITE"),
            (AccessFlags::READ_WRITE, "READ_WRITE"),
            (AccessFlags::CREATE, "CREATE"),
            (AccessFlags::EXCLUSIVE, "EXCLUSIVE"),
            (AccessFlags::TRUNCATE, "TRUNCATE"),
            (AccessFlags::APPEND, "APPEND"),
        ];

        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "AccessFlags(empty)")
        } else {
            write!(f, "AccessFlags({})", set.join(" | "))
        }
    }
}
