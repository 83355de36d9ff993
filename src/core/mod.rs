// Core module - Frame codec and exchange protocol
pub mod exchange;
pub mod frame;
