//! Substitution tables and symbol classification
//!
//! Three LUT families back the codec. `pri0` holds one constant byte per LUT
//! set. `pri1` and `pri2` hold sixteen bytes per set, addressed by a 4-bit code.
//! The classifier maps a symbol's high nibble to the class the compressor tries
//! first.

use crate::common::{check_layer, check_lut_num, SymbolType, LUT_ENTRIES, NUM_LAYERS, NUM_LUTS};
use crate::Result;

/// One sixteen-entry pri1/pri2 table
pub type Lut16 = [u8; LUT_ENTRIES];

/// The pri0/pri1/pri2 table sets used by both codec directions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTables {
    pri0: [u8; NUM_LUTS],
    pri1: [Lut16; NUM_LUTS],
    pri2: [Lut16; NUM_LUTS],
}

impl LookupTables {
    /// Tables with every entry zero
    pub fn zeroed() -> Self {
        Self {
            pri0: [0; NUM_LUTS],
            pri1: [[0; LUT_ENTRIES]; NUM_LUTS],
            pri2: [[0; LUT_ENTRIES]; NUM_LUTS],
        }
    }

    /// Overwrite the pri0 value of one LUT set
    pub fn set_pri0(&mut self, lut_num: u8, value: u8) -> Result<()> {
        check_lut_num(lut_num)?;
        self.pri0[lut_num as usize] = value;
        Ok(())
    }

    /// Overwrite all sixteen pri1 entries of one LUT set
    pub fn set_pri1(&mut self, lut_num: u8, entries: &Lut16) -> Result<()> {
        check_lut_num(lut_num)?;
        self.pri1[lut_num as usize] = *entries;
        Ok(())
    }

    /// Overwrite all sixteen pri2 entries of one LUT set
    pub fn set_pri2(&mut self, lut_num: u8, entries: &Lut16) -> Result<()> {
        check_lut_num(lut_num)?;
        self.pri2[lut_num as usize] = *entries;
        Ok(())
    }

    /// PRI0 value of a LUT set
    ///
    /// `lut_num` is taken modulo the number of sets so that a 3-bit header
    /// field can be passed straight through.
    pub fn pri0(&self, lut_num: u8) -> u8 {
        self.pri0[lut_num as usize % NUM_LUTS]
    }

    /// pri1 table of a LUT set
    pub fn pri1(&self, lut_num: u8) -> &Lut16 {
        &self.pri1[lut_num as usize % NUM_LUTS]
    }

    /// pri2 table of a LUT set
    pub fn pri2(&self, lut_num: u8) -> &Lut16 {
        &self.pri2[lut_num as usize % NUM_LUTS]
    }

    /// Position of `symbol` in a sixteen-entry table (first match wins)
    pub fn find(table: &Lut16, symbol: u8) -> Option<u8> {
        table
            .iter()
            .position(|&entry| entry == symbol)
            .map(|index| index as u8)
    }
}

impl Default for LookupTables {
    /// pri0 is zero, pri1 holds 1..=16 and pri2 holds -1..=-16 as int8
    fn default() -> Self {
        let mut tables = Self::zeroed();
        for lut in 0..NUM_LUTS {
            for i in 0..LUT_ENTRIES {
                tables.pri1[lut][i] = (i + 1) as u8;
                tables.pri2[lut][i] = 0xFF - i as u8;
            }
        }
        tables
    }
}

/// Per-nibble class assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolTypeTable {
    entries: [SymbolType; 16],
}

impl SymbolTypeTable {
    /// Build a table from explicit per-nibble classes
    pub fn from_entries(entries: [SymbolType; 16]) -> Self {
        Self { entries }
    }

    /// Class assigned to a 4-bit value
    pub fn get(&self, nibble: u8) -> SymbolType {
        self.entries[(nibble & 0x0F) as usize]
    }

    /// Class a symbol is first tried as, taken from its high nibble
    pub fn classify(&self, symbol: u8) -> SymbolType {
        self.get(symbol >> 4)
    }

    /// All sixteen entries
    pub fn entries(&self) -> &[SymbolType; 16] {
        &self.entries
    }

    /// Check whether any nibble is left without a class
    pub fn has_unknown(&self) -> bool {
        self.entries.contains(&SymbolType::Unknown)
    }
}

use SymbolType::{Pri0 as P0, Pri1 as P1, Pri2 as P2, Uncoded as UC};

/// The predefined layer partitions, indexed by the symbol's high nibble
const LAYERS: [[SymbolType; 16]; NUM_LAYERS] = [
    // Small signed values around zero
    [P1, P1, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, P2, P2],
    // Wider signed range
    [P1, P1, P1, P1, UC, UC, UC, UC, UC, UC, UC, UC, P2, P2, P2, P2],
    // Split by sign bit
    [P1, P1, P1, P1, P1, P1, P1, P1, P2, P2, P2, P2, P2, P2, P2, P2],
    // Zero-dominated data
    [P0, P1, P1, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, P2],
    // Small unsigned values
    [P1, P1, P2, P2, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC],
    // Mirrored sign assignment
    [P2, P2, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, P1, P1],
    // Mask-only: no LUT coding
    [UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC, UC],
    // Quartered range
    [P0, P0, P0, P0, P1, P1, P1, P1, P2, P2, P2, P2, UC, UC, UC, UC],
];

/// Builds symbol type tables from the predefined layer partitions
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolClassifier;

impl SymbolClassifier {
    /// Build the table for layer `layer` (0-7)
    pub fn build_table(layer: u8) -> Result<SymbolTypeTable> {
        check_layer(layer)?;
        Ok(SymbolTypeTable::from_entries(LAYERS[layer as usize]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables() {
        let tables = LookupTables::default();
        assert_eq!(tables.pri0(0), 0x00);
        assert_eq!(tables.pri1(3)[0], 1);
        assert_eq!(tables.pri1(3)[15], 16);
        assert_eq!(tables.pri2(7)[0], 0xFF);
        assert_eq!(tables.pri2(7)[15], 0xF0);
    }

    #[test]
    fn test_loads_overwrite_one_set() {
        let mut tables = LookupTables::default();
        tables.set_pri0(2, 0x80).unwrap();
        tables.set_pri1(2, &[0xAA; 16]).unwrap();
        tables.set_pri2(2, &[0x55; 16]).unwrap();

        assert_eq!(tables.pri0(2), 0x80);
        assert_eq!(tables.pri0(1), 0x00);
        assert_eq!(tables.pri1(2), &[0xAA; 16]);
        assert_eq!(tables.pri1(1)[0], 1);
        assert_eq!(tables.pri2(2), &[0x55; 16]);

        assert!(tables.set_pri0(8, 0).is_err());
        assert!(tables.set_pri1(8, &[0; 16]).is_err());
        assert!(tables.set_pri2(8, &[0; 16]).is_err());
    }

    #[test]
    fn test_find() {
        let tables = LookupTables::default();
        assert_eq!(LookupTables::find(tables.pri1(0), 1), Some(0));
        assert_eq!(LookupTables::find(tables.pri1(0), 16), Some(15));
        assert_eq!(LookupTables::find(tables.pri1(0), 17), None);
        assert_eq!(LookupTables::find(tables.pri2(0), 0xF8), Some(7));

        // Duplicate entries resolve to the first index
        assert_eq!(LookupTables::find(&[7; 16], 7), Some(0));
    }

    #[test]
    fn test_every_layer_assigns_every_nibble() {
        for layer in 0..8 {
            let table = SymbolClassifier::build_table(layer).unwrap();
            assert!(!table.has_unknown(), "layer {layer} leaves a nibble unassigned");
        }
        assert!(SymbolClassifier::build_table(8).is_err());
    }

    #[test]
    fn test_classify_uses_high_nibble() {
        let table = SymbolClassifier::build_table(0).unwrap();
        assert_eq!(table.classify(0x05), SymbolType::Pri1);
        assert_eq!(table.classify(0x10), SymbolType::Pri1);
        assert_eq!(table.classify(0x42), SymbolType::Uncoded);
        assert_eq!(table.classify(0xF3), SymbolType::Pri2);
        assert_eq!(table.get(0x1E), SymbolType::Pri2);
    }

    #[test]
    fn test_default_table_is_unknown() {
        let table = SymbolTypeTable::default();
        assert!(table.has_unknown());
        assert_eq!(table.classify(0x12), SymbolType::Unknown);
    }
}
