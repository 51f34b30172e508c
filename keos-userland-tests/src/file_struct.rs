//! Per-process file descriptor table bookkeeping: reserved stdio slots,
//! monotonic descriptor numbers, and the open-file ceiling.
use keos::{KernelError, syscall::flags::FileMode};
use keos_userland::file_struct::{FileDescriptor, FileKind, FileStruct, STDIN_FD, STDOUT_FD};

fn stdio_entry() -> keos_userland::file_struct::File {
    keos_userland::file_struct::File {
        mode: FileMode::Read,
        file: FileKind::Stdio,
    }
}

pub fn stdio_descriptors_are_preinstalled() {
    let fs = FileStruct::new();
    assert!(fs.files.contains_key(&STDIN_FD));
    assert!(fs.files.contains_key(&STDOUT_FD));
}

pub fn descriptor_numbers_never_repeat() {
    let mut fs = FileStruct::new();
    let a = fs.install_file(stdio_entry()).unwrap();
    fs.close(a);
    let b = fs.install_file(stdio_entry()).unwrap();
    assert_ne!(a, b, "a closed descriptor number must never be reused");
    assert!(b.0 > a.0);
}

pub fn too_many_open_files_is_rejected() {
    let mut fs = FileStruct::new();
    let already_open = fs.files.len();
    for _ in 0..(FileStruct::MAX_OPEN_FILES - already_open) {
        fs.install_file(stdio_entry()).unwrap();
    }
    assert!(matches!(
        fs.install_file(stdio_entry()),
        Err(KernelError::TooManyOpenFile)
    ));
}

pub fn close_and_seek_on_unknown_fd_are_silent_no_ops() {
    let mut fs = FileStruct::new();
    let unknown = FileDescriptor(999);
    // Neither call has a Result to unwrap: both are infallible by design,
    // an unknown fd must not be reported back to the caller as an error.
    fs.seek(unknown, 123);
    fs.close(unknown);
}
