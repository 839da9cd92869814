//! 基于 Win32 API 的映射来源
//!
//! - 网络驱动器：`WNetGetConnectionW`，结果与系统显示语言无关
//! - SUBST 驱动器：`QueryDosDeviceW`，目标形如 `\??\C:\work`
//!
//! 非 Windows 平台只编译目标解析函数。

use super::command::expand_unc_marker;

/// SUBST 驱动器在 DOS 设备命名空间中的前缀
const DOS_DEVICE_PREFIX: &str = r"\??\";

/// 解析 `QueryDosDeviceW` 返回的设备目标
///
/// `\??\C:\work` → `C:\work`，`\??\UNC\server\share` → `\\server\share`；
/// 普通卷（`\Device\HarddiskVolume3`）和网络重定向器返回 None
pub fn parse_dos_device_target(target: &str) -> Option<String> {
    let rest = target.strip_prefix(DOS_DEVICE_PREFIX)?.trim_end_matches('\0');
    if rest.is_empty() {
        return None;
    }
    Some(expand_unc_marker(rest))
}

#[cfg(windows)]
pub use imp::WindowsMappingSource;

#[cfg(windows)]
mod imp {
    use std::ffi::OsStr;
    use std::iter::once;
    use std::os::windows::ffi::OsStrExt;

    use windows_sys::Win32::Foundation::{ERROR_CONNECTION_UNAVAIL, ERROR_MORE_DATA, NO_ERROR};
    use windows_sys::Win32::NetworkManagement::WNet::WNetGetConnectionW;
    use windows_sys::Win32::Storage::FileSystem::{GetLogicalDrives, QueryDosDeviceW};

    use super::parse_dos_device_target;
    use crate::mapping::source::{MappingSource, MappingSourceError};
    use crate::mapping::table::DriveMapping;

    const BUFFER_LEN: usize = 1024;

    /// 直接调用 Win32 API 的映射来源
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WindowsMappingSource;

    impl WindowsMappingSource {
        pub fn new() -> Self {
            Self
        }
    }

    fn wide(s: &str) -> Vec<u16> {
        OsStr::new(s).encode_wide().chain(once(0)).collect()
    }

    fn from_wide(buf: &[u16]) -> String {
        let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        String::from_utf16_lossy(&buf[..end])
    }

    /// 网络驱动器的远程名，以及是否为已记住但当前不可用的连接
    fn network_target(device: &[u16]) -> Option<(String, bool)> {
        let mut buf = vec![0u16; BUFFER_LEN];
        let mut len = buf.len() as u32;
        let mut code = unsafe { WNetGetConnectionW(device.as_ptr(), buf.as_mut_ptr(), &mut len) };
        if code == ERROR_MORE_DATA {
            buf.resize(len as usize, 0);
            len = buf.len() as u32;
            code = unsafe { WNetGetConnectionW(device.as_ptr(), buf.as_mut_ptr(), &mut len) };
        }

        match code {
            NO_ERROR => Some((from_wide(&buf), false)),
            ERROR_CONNECTION_UNAVAIL => Some((from_wide(&buf), true)),
            _ => None,
        }
    }

    fn dos_device_target(device: &[u16]) -> Option<String> {
        let mut buf = vec![0u16; BUFFER_LEN];
        let written = unsafe { QueryDosDeviceW(device.as_ptr(), buf.as_mut_ptr(), buf.len() as u32) };
        if written == 0 {
            return None;
        }
        // 多字符串，第一项是当前目标
        Some(from_wide(&buf[..written as usize]))
    }

    impl MappingSource for WindowsMappingSource {
        fn name(&self) -> &'static str {
            "windows"
        }

        fn query(&self) -> Result<Vec<DriveMapping>, MappingSourceError> {
            let present = unsafe { GetLogicalDrives() };
            if present == 0 {
                return Err(MappingSourceError::Io(std::io::Error::last_os_error()));
            }

            let mut mappings = Vec::new();
            for index in 0..26u8 {
                let letter = (b'A' + index) as char;
                let device = wide(&format!("{}:", letter));

                // 断开的持久映射不在 GetLogicalDrives 的位图里
                if let Some((remote, persistent)) = network_target(&device) {
                    match DriveMapping::network(letter, &remote) {
                        Ok(mapping) => mappings.push(mapping.with_persistent(persistent)),
                        Err(e) => log::debug!("[WindowsMappingSource] 跳过 {}: {}", letter, e),
                    }
                    continue;
                }

                if present & (1 << index) == 0 {
                    continue;
                }
                let Some(target) = dos_device_target(&device).and_then(|t| parse_dos_device_target(&t)) else {
                    continue;
                };
                match DriveMapping::subst(letter, &target) {
                    Ok(mapping) => mappings.push(mapping),
                    Err(e) => log::debug!("[WindowsMappingSource] 跳过 {}: {}", letter, e),
                }
            }

            log::debug!("[WindowsMappingSource] 查询到 {} 条映射", mappings.len());
            Ok(mappings)
        }
    }
}
