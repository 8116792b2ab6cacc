use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::{io, path::Path};

pub mod videodev;
pub mod vidioc;

/// A convenience wrapper around open(2).
///
/// Returns the file descriptor on success.
/// In case of errors, the last OS error will be reported, aka errno on Linux.
///
/// # Arguments
///
/// * `path` - Path to the device node
/// * `flags` - Open flags
pub fn open<P: AsRef<Path>>(path: P, flags: i32) -> io::Result<std::os::raw::c_int> {
    let c_path = CString::new(path.as_ref().as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let fd = unsafe { libc::open(c_path.as_ptr(), flags) };

    if fd == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

/// A convenience wrapper around close(2).
///
/// In case of errors, the last OS error will be reported, aka errno on Linux.
pub fn close(fd: std::os::raw::c_int) -> io::Result<()> {
    let ret = unsafe { libc::close(fd) };

    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// A convenience wrapper around ioctl(2).
///
/// The call is retried while it fails with EINTR, so callers never observe
/// interrupted-syscall errors. In case of other errors, the last OS error
/// will be reported, aka errno on Linux.
///
/// # Arguments
///
/// * `fd` - File descriptor
/// * `request` - IO control code (see [`vidioc`])
/// * `argp` - Pointer to memory region holding the argument type
///
/// # Safety
///
/// For maximum flexibility, argp must be a raw pointer. Thus, the entire
/// function is unsafe.
pub unsafe fn ioctl(
    fd: std::os::raw::c_int,
    request: vidioc::_IOC_TYPE,
    argp: *mut std::os::raw::c_void,
) -> io::Result<()> {
    loop {
        /*
         * It turns out the libc crate (and libc itself!) defines ioctl() with
         * different, incompatible argument types on different platforms. To
         * hack around this without conditional compilation, use syscall()
         * instead as a drop-in replacement. Details:
         * https://github.com/rust-lang/libc/issues/1036
         */
        let ret = libc::syscall(libc::SYS_ioctl, fd, request, argp) as std::os::raw::c_int;
        if ret != -1 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

/// A convenience wrapper around mmap(2).
///
/// In case of errors, the last OS error will be reported, aka errno on Linux.
///
/// # Arguments
///
/// * `start` - Starting address of the new mapping, usually NULL
/// * `length` - Length of the mapped region
/// * `prot` - Desired memory protection of the mapped region
/// * `flags` - Mapping flags
/// * `fd` - File descriptor of the mapping source (device node or DMA-BUF)
/// * `offset` - Offset in the source region
///
/// # Safety
///
/// Start must be a raw pointer. Thus, the entire function is unsafe.
pub unsafe fn mmap(
    start: *mut std::os::raw::c_void,
    length: usize,
    prot: std::os::raw::c_int,
    flags: std::os::raw::c_int,
    fd: std::os::raw::c_int,
    offset: libc::off_t,
) -> io::Result<*mut std::os::raw::c_void> {
    let ret = libc::mmap(start, length, prot, flags, fd, offset);
    if ret == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// A convenience wrapper around munmap(2).
///
/// In case of errors, the last OS error will be reported, aka errno on Linux.
///
/// # Safety
///
/// Start must be a raw pointer. Thus, the entire function is unsafe.
pub unsafe fn munmap(start: *mut std::os::raw::c_void, length: usize) -> io::Result<()> {
    let ret = libc::munmap(start, length);
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
