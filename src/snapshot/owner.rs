//! Resolve the service account that owns the generated facts file.

use crate::core::{FactError, Result};
use std::ffi::CString;
use std::io;
use std::os::unix::fs::chown;
use std::path::Path;

const MAX_BUFFER: usize = 1 << 20;

/// Numeric owner applied to the facts directory and file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

impl Ownership {
    /// Look up `user` and `group` in the system databases. Either name
    /// failing to resolve is an infrastructure error.
    pub fn resolve(user: &str, group: &str) -> Result<Self> {
        Ok(Self {
            uid: lookup_uid(user)?,
            gid: lookup_gid(group)?,
        })
    }

    pub fn apply(&self, path: &Path) -> Result<()> {
        chown(path, Some(self.uid), Some(self.gid)).map_err(|e| {
            FactError::Infrastructure(format!(
                "Failed to set owner {}:{} on {}: {}",
                self.uid,
                self.gid,
                path.display(),
                e
            ))
        })
    }
}

fn c_name(kind: &str, name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| FactError::Infrastructure(format!("Invalid {} name '{}'", kind, name)))
}

pub fn lookup_uid(name: &str) -> Result<u32> {
    let c_name = c_name("user", name)?;
    let mut buf: Vec<libc::c_char> = vec![0; 1024];

    loop {
        // SAFETY: every pointer refers to live, correctly sized storage owned
        // by this frame; `result` is only read after the call returns.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = unsafe { libc::getpwnam_r(c_name.as_ptr(), &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result) };

        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(FactError::Infrastructure(format!(
                "Failed to look up user {}: {}",
                name,
                io::Error::from_raw_os_error(rc)
            )));
        }
        if result.is_null() {
            return Err(FactError::Infrastructure(format!("User {} does not exist", name)));
        }
        return Ok(pwd.pw_uid);
    }
}

pub fn lookup_gid(name: &str) -> Result<u32> {
    let c_name = c_name("group", name)?;
    let mut buf: Vec<libc::c_char> = vec![0; 1024];

    loop {
        // SAFETY: as in `lookup_uid`.
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::group = std::ptr::null_mut();
        let rc = unsafe { libc::getgrnam_r(c_name.as_ptr(), &mut grp, buf.as_mut_ptr(), buf.len(), &mut result) };

        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(FactError::Infrastructure(format!(
                "Failed to look up group {}: {}",
                name,
                io::Error::from_raw_os_error(rc)
            )));
        }
        if result.is_null() {
            return Err(FactError::Infrastructure(format!("Group {} does not exist", name)));
        }
        return Ok(grp.gr_gid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_root() {
        let owner = Ownership::resolve("root", "root").unwrap();
        assert_eq!(owner, Ownership { uid: 0, gid: 0 });
    }

    #[test]
    fn test_unknown_user_and_group() {
        let err = lookup_uid("no-such-user-puppetconfig").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(lookup_gid("no-such-group-puppetconfig").is_err());
    }

    #[test]
    fn test_interior_nul_rejected() {
        assert!(lookup_uid("ro\0ot").is_err());
    }
}
