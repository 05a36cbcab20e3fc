use crate::proc::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("process table exhausted")]
    OutOfPcbs,
    #[error("semaphore descriptor table exhausted")]
    OutOfSemDescriptors,
    #[error("process {0} is not blocked on the given semaphore")]
    NotBlocked(Pid),
    #[error("no device at line {line}, device {device}")]
    NoSuchDevice { line: usize, device: usize },
}
