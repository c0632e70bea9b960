pub mod shutdown;
pub mod sweep_loop;
