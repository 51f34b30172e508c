//! # Per-process file descriptor table.
//!
//! Every process keeps a [`FileStruct`]: a table mapping small integer file
//! descriptors to open [`File`]s, plus the process's current working
//! directory. File descriptors 0 and 1 are reserved for standard input and
//! standard output and are installed by [`FileStruct::new`]; every other
//! descriptor is handed out from a monotonically increasing counter starting
//! at 2. A descriptor is never reused within the lifetime of a [`FileStruct`],
//! even after it is closed.
//!
//! All filesystem operations that touch more than one process's table (or the
//! table and the executing thread's notion of "this process's exec file") go
//! through a single global lock, [`FS_LOCK`]; see [`crate::pcb`] for where
//! that invariant is enforced.
use crate::sync::Mutex;
use alloc::collections::BTreeMap;
use keos::{
    KernelError,
    fs::{Directory, RegularFile},
    syscall::flags::FileMode,
    teletype::{Teletype, serial},
};

/// The single global lock serializing every file-system call made through
/// any process's [`FileStruct`]. [`crate::syscall::dispatch`] acquires it
/// around each syscall that touches the file system (everything in this
/// module except the in-memory bookkeeping of [`FileStruct::install_file`]),
/// never across more than one such call.
pub static FS_LOCK: Mutex<()> = Mutex::new(());

/// The kind of object a [`File`] wraps.
#[derive(Clone)]
pub enum FileKind {
    /// A regular, seekable file on the filesystem.
    RegularFile {
        /// The underlying kernel file object.
        file: RegularFile,
        /// Current byte offset for the next `read`/`write`.
        position: usize,
    },
    /// A directory, opened so its entries can later be read.
    Directory {
        /// The underlying kernel directory object.
        dir: Directory,
        /// Current entry offset for the next `readdir`-style call.
        position: usize,
    },
    /// Standard input or standard output.
    Stdio,
}

/// An open file together with the mode it was opened in.
#[derive(Clone)]
pub struct File {
    /// Whether this descriptor may be read from, written to, or both.
    pub mode: FileMode,
    /// The object this descriptor refers to.
    pub file: FileKind,
}

/// An index into a process's file descriptor table.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct FileDescriptor(pub i32);

/// Standard input.
pub const STDIN_FD: FileDescriptor = FileDescriptor(0);
/// Standard output.
pub const STDOUT_FD: FileDescriptor = FileDescriptor(1);

/// Per-process open-file table and current working directory.
#[derive(Clone)]
pub struct FileStruct {
    /// The process's current working directory.
    pub cwd: Directory,
    /// Open file descriptors, keyed by their descriptor number.
    pub files: BTreeMap<FileDescriptor, File>,
    /// The descriptor number that will be handed to the next opened file.
    next_fd: i32,
}

impl Default for FileStruct {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStruct {
    /// Maximum number of file descriptors a single process may hold open.
    pub const MAX_OPEN_FILES: usize = 1024;

    /// Create a fresh file descriptor table with stdin/stdout installed.
    pub fn new() -> Self {
        let mut this = Self {
            cwd: keos::fs::FileSystem::root(),
            files: BTreeMap::new(),
            next_fd: 2,
        };
        this.files.insert(
            STDIN_FD,
            File {
                mode: FileMode::Read,
                file: FileKind::Stdio,
            },
        );
        this.files.insert(
            STDOUT_FD,
            File {
                mode: FileMode::Write,
                file: FileKind::Stdio,
            },
        );
        this
    }

    /// Install `file` at the next descriptor number and return it.
    ///
    /// Descriptor numbers are handed out from a counter that only ever
    /// increases, so a closed descriptor's number is never seen again.
    ///
    /// # Errors
    /// [`KernelError::TooManyOpenFile`] if the table already holds
    /// [`Self::MAX_OPEN_FILES`] entries.
    pub fn install_file(&mut self, file: File) -> Result<FileDescriptor, KernelError> {
        if self.files.len() >= Self::MAX_OPEN_FILES {
            return Err(KernelError::TooManyOpenFile);
        }
        let fd = FileDescriptor(self.next_fd);
        self.next_fd += 1;
        self.files.insert(fd, file);
        Ok(fd)
    }

    fn get(&self, fd: FileDescriptor) -> Result<&File, KernelError> {
        self.files.get(&fd).ok_or(KernelError::BadFileDescriptor)
    }

    fn get_mut(&mut self, fd: FileDescriptor) -> Result<&mut File, KernelError> {
        self.files
            .get_mut(&fd)
            .ok_or(KernelError::BadFileDescriptor)
    }

    /// Create a new, empty regular file named `path` relative to `cwd`.
    pub fn create(&mut self, path: &str) -> Result<(), KernelError> {
        self.cwd.create(path, false)?;
        Ok(())
    }

    /// Remove the file or empty directory named `path` relative to `cwd`.
    pub fn remove(&mut self, path: &str) -> Result<(), KernelError> {
        self.cwd.unlink(path)
    }

    /// Open `path` relative to `cwd`, installing it with `mode`.
    pub fn open(&mut self, path: &str, mode: FileMode) -> Result<FileDescriptor, KernelError> {
        let file = self.cwd.open(path)?;
        let kind = if let Some(file) = file.clone().into_regular_file() {
            FileKind::RegularFile { file, position: 0 }
        } else if let Some(dir) = file.into_directory() {
            FileKind::Directory { dir, position: 0 }
        } else {
            return Err(KernelError::NoSuchEntry);
        };
        self.install_file(File { mode, file: kind })
    }

    /// Size, in bytes, of the regular file open at `fd`.
    pub fn filesize(&self, fd: FileDescriptor) -> Result<usize, KernelError> {
        match &self.get(fd)?.file {
            FileKind::RegularFile { file, .. } => Ok(file.size()),
            _ => Err(KernelError::InvalidArgument),
        }
    }

    /// Read up to `buf.len()` bytes from `fd` into `buf`, returning the
    /// number of bytes actually read.
    pub fn read(&mut self, fd: FileDescriptor, buf: &mut [u8]) -> Result<usize, KernelError> {
        let entry = self.get_mut(fd)?;
        if entry.mode == FileMode::Write {
            return Err(KernelError::OperationNotPermitted);
        }
        match &mut entry.file {
            FileKind::RegularFile { file, position } => {
                let n = file.read(*position, buf)?;
                *position += n;
                Ok(n)
            }
            FileKind::Stdio => serial().lock().read(buf),
            FileKind::Directory { .. } => Err(KernelError::IsDirectory),
        }
    }

    /// Write `buf` to `fd`, returning the number of bytes actually written.
    pub fn write(&mut self, fd: FileDescriptor, buf: &[u8]) -> Result<usize, KernelError> {
        let entry = self.get_mut(fd)?;
        if entry.mode == FileMode::Read {
            return Err(KernelError::OperationNotPermitted);
        }
        match &mut entry.file {
            FileKind::RegularFile { file, position } => {
                let n = file.write(*position, buf)?;
                *position += n;
                Ok(n)
            }
            FileKind::Stdio => serial().lock().write(buf),
            FileKind::Directory { .. } => Err(KernelError::IsDirectory),
        }
    }

    /// Move `fd`'s cursor to absolute byte offset `position`.
    ///
    /// A silent no-op if `fd` is unknown or refers to standard input/output,
    /// per §4.8: `SEEK` never fails the caller.
    pub fn seek(&mut self, fd: FileDescriptor, position: usize) {
        if let Ok(entry) = self.get_mut(fd) {
            match &mut entry.file {
                FileKind::RegularFile { position: pos, .. } => *pos = position,
                FileKind::Directory { position: pos, .. } => *pos = position,
                FileKind::Stdio => {}
            }
        }
    }

    /// Current cursor position of `fd`.
    pub fn tell(&self, fd: FileDescriptor) -> Result<usize, KernelError> {
        match &self.get(fd)?.file {
            FileKind::RegularFile { position, .. } => Ok(*position),
            FileKind::Directory { position, .. } => Ok(*position),
            FileKind::Stdio => Err(KernelError::InvalidArgument),
        }
    }

    /// Close `fd`, removing it from the table.
    ///
    /// Closing an unknown `fd` is not an error (§4.2): this is a silent
    /// no-op rather than a [`KernelError::BadFileDescriptor`].
    pub fn close(&mut self, fd: FileDescriptor) {
        self.files.remove(&fd);
    }

    /// Close every open descriptor, including standard input/output.
    ///
    /// Called once, at process exit, after every thread in the process has
    /// terminated.
    pub fn close_all(&mut self) {
        self.files.clear();
    }
}
