pub mod dfg;
pub mod instances;
pub mod io;
