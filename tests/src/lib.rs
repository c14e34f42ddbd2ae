//! Cross-crate tests: the interaction controller driven against the mock backend

#[cfg(test)]
mod interactions;
