use bytes::Bytes;

use super::*;

/// Result of a SET that may fail under memory pressure.
#[derive(Debug, PartialEq, Eq)]
pub enum SetResult {
    /// The key was stored successfully.
    Ok,
    /// Memory limit reached; the write was refused.
    OutOfMemory,
}

impl Keyspace {
    /// Stores a string value, overwriting any existing value of any type.
    pub fn set(&mut self, key: String, data: Bytes) -> SetResult {
        let new_value = Value::String(data);

        if let Some(existing) = self.entries.get(key.as_str()) {
            let old_size = memory::entry_size(&key, existing);
            let new_size = memory::entry_size(&key, &new_value);
            if new_size > old_size && !self.can_grow(new_size - old_size) {
                return SetResult::OutOfMemory;
            }
            let slot = self
                .entries
                .get_mut(key.as_str())
                .expect("entry looked up above");
            *slot = new_value;
            self.memory.adjust(old_size, new_size);
            return SetResult::Ok;
        }

        let size = memory::entry_size(&key, &new_value);
        if !self.can_grow(size) {
            return SetResult::OutOfMemory;
        }
        self.memory.add(&key, &new_value);
        self.entries.insert(key.into_boxed_str(), new_value);
        SetResult::Ok
    }

    /// Fetches a string value. `Ok(None)` when the key doesn't exist.
    pub fn get(&self, key: &str) -> Result<Option<Bytes>, WrongType> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::String(data)) => Ok(Some(data.clone())),
            Some(_) => Err(WrongType),
        }
    }
}
