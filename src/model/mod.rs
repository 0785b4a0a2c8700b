pub mod increment;
pub mod issue;
pub mod snapshot;
pub mod user;

#[cfg(test)]
pub mod fixtures;
