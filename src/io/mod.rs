pub(crate) mod mmap;
pub(crate) mod queue;
pub(crate) mod userptr;
