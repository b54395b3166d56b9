pub mod hash;
pub mod io;
pub mod logging;
