//! WebAssembly table instance
//!
//! Tables hold optional function addresses; the element kind is function
//! reference only. Slots start empty and are populated from element
//! segments during instantiation or by the embedder.

use super::store::FuncAddr;
use super::VmError;

/// A table instance: function-address slots plus min/max bounds.
#[derive(Debug)]
pub struct TableInstance {
    elements: Vec<Option<FuncAddr>>,
    min: u32,
    max: Option<u32>,
}

impl TableInstance {
    /// Create a table sized to `min` with all slots empty
    pub fn new(min: u32, max: Option<u32>) -> Result<Self, VmError> {
        if let Some(max) = max {
            if min > max {
                return Err(VmError::TableSizeExceeded);
            }
        }
        Ok(TableInstance {
            elements: vec![None; min as usize],
            min,
            max,
        })
    }

    /// Current number of slots
    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    /// Declared minimum size
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Declared maximum size, if any
    pub fn max(&self) -> Option<u32> {
        self.max
    }

    /// Read a slot
    ///
    /// # Errors
    /// - `WrongInstanceAddress` if `idx` is out of range or the slot is
    ///   empty (an uninitialised element)
    pub fn get(&self, idx: u32) -> Result<FuncAddr, VmError> {
        match self.elements.get(idx as usize) {
            Some(Some(addr)) => Ok(*addr),
            Some(None) => Err(VmError::WrongInstanceAddress(format!(
                "uninitialized table element {idx}"
            ))),
            None => Err(VmError::WrongInstanceAddress(format!(
                "table index {idx} out of range (size {})",
                self.size()
            ))),
        }
    }

    /// Write a slot
    pub fn set(&mut self, idx: u32, addr: FuncAddr) -> Result<(), VmError> {
        match self.elements.get_mut(idx as usize) {
            Some(slot) => {
                *slot = Some(addr);
                Ok(())
            }
            None => Err(VmError::WrongInstanceAddress(format!(
                "table index {idx} out of range"
            ))),
        }
    }

    /// Copy `addrs` into slots starting at `offset`
    ///
    /// Used for element segments; the whole range is validated before any
    /// slot is written.
    ///
    /// # Errors
    /// - `TableSizeExceeded` if `offset + addrs.len()` exceeds the table size
    pub fn init(&mut self, offset: u32, addrs: &[FuncAddr]) -> Result<(), VmError> {
        let end = offset as u64 + addrs.len() as u64;
        if end > self.size() as u64 {
            return Err(VmError::TableSizeExceeded);
        }
        for (i, addr) in addrs.iter().enumerate() {
            self.elements[offset as usize + i] = Some(*addr);
        }
        Ok(())
    }
}
