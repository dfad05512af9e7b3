use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::genotype::{Genome, GenotypeId, InventoryGenotype};

/// Told when a genotype's alive count first reaches the inventory's
/// notification threshold. Each genotype is reported at most once.
pub trait InventoryListener {
    fn genotype_reached_threshold(&mut self, id: GenotypeId, genotype: &InventoryGenotype);
}

/// The registry of known species.
///
/// Genotypes live in an insert-only arena; the genome and size indexes are
/// derived from it and rebuilt after deserialization. Listeners and the
/// notification threshold are runtime state and are not archived.
#[derive(Serialize, Deserialize)]
#[serde(from = "InventoryArchive")]
pub struct Inventory {
    genotypes: Vec<InventoryGenotype>,
    num_species_ever: u32,
    num_species_current: u32,
    speciation_count: u32,
    extinction_count: u32,
    #[serde(skip)]
    genome_index: BTreeMap<Genome, GenotypeId>,
    #[serde(skip)]
    size_index: BTreeMap<u32, Vec<GenotypeId>>,
    #[serde(skip)]
    listener_alive_threshold: u32,
    #[serde(skip)]
    notified_genotypes: BTreeSet<GenotypeId>,
    #[serde(skip)]
    listeners: Vec<Box<dyn InventoryListener>>,
}

/// Archived fields of an Inventory; the indexes are derived
#[derive(Deserialize)]
struct InventoryArchive {
    genotypes: Vec<InventoryGenotype>,
    num_species_ever: u32,
    num_species_current: u32,
    speciation_count: u32,
    extinction_count: u32,
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory")
            .field("genotypes", &self.genotypes)
            .field("num_species_ever", &self.num_species_ever)
            .field("num_species_current", &self.num_species_current)
            .field("speciation_count", &self.speciation_count)
            .field("extinction_count", &self.extinction_count)
            .field("genome_index", &self.genome_index)
            .field("size_index", &self.size_index)
            .field("listener_alive_threshold", &self.listener_alive_threshold)
            .field("notified_genotypes", &self.notified_genotypes)
            .finish()
    }
}

impl From<InventoryArchive> for Inventory {
    fn from(archive: InventoryArchive) -> Self {
        let mut inventory = Inventory {
            genotypes: archive.genotypes,
            num_species_ever: archive.num_species_ever,
            num_species_current: archive.num_species_current,
            speciation_count: archive.speciation_count,
            extinction_count: archive.extinction_count,
            genome_index: BTreeMap::new(),
            size_index: BTreeMap::new(),
            listener_alive_threshold: 0,
            notified_genotypes: BTreeSet::new(),
            listeners: Vec::new(),
        };
        for (index, genotype) in inventory.genotypes.iter().enumerate() {
            let id = index as GenotypeId;
            inventory
                .genome_index
                .insert(genotype.genome().clone(), id);
            inventory
                .size_index
                .entry(genotype.genome().len())
                .or_default()
                .push(id);
        }
        inventory
    }
}

impl PartialEq for Inventory {
    fn eq(&self, other: &Self) -> bool {
        self.genotypes == other.genotypes
            && self.num_species_ever == other.num_species_ever
            && self.num_species_current == other.num_species_current
            && self.speciation_count == other.speciation_count
            && self.extinction_count == other.extinction_count
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        Inventory {
            genotypes: Vec::new(),
            num_species_ever: 0,
            num_species_current: 0,
            speciation_count: 0,
            extinction_count: 0,
            genome_index: BTreeMap::new(),
            size_index: BTreeMap::new(),
            listener_alive_threshold: 0,
            notified_genotypes: BTreeSet::new(),
            listeners: Vec::new(),
        }
    }

    /// Exact byte-sequence lookup
    pub fn find(&self, genome: &Genome) -> Option<GenotypeId> {
        self.genome_index.get(genome).copied()
    }

    pub fn genotype(&self, id: GenotypeId) -> &InventoryGenotype {
        &self.genotypes[id as usize]
    }

    pub(crate) fn genotype_mut(&mut self, id: GenotypeId) -> &mut InventoryGenotype {
        &mut self.genotypes[id as usize]
    }

    pub fn num_genotypes(&self) -> usize {
        self.genotypes.len()
    }

    /// Iterate genotypes in creation order
    pub fn genotypes(&self) -> impl Iterator<Item = (GenotypeId, &InventoryGenotype)> {
        self.genotypes
            .iter()
            .enumerate()
            .map(|(index, genotype)| (index as GenotypeId, genotype))
    }

    /// Genotype ids of a given genome length, oldest first
    pub fn genotypes_of_length(&self, length: u32) -> &[GenotypeId] {
        self.size_index
            .get(&length)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Idempotent insertion. Returns the genotype id and whether it is new;
    /// new genotypes are named `<length>-<serial>` with the next unused
    /// serial for that length.
    pub fn enter(&mut self, genome: Genome) -> (GenotypeId, bool) {
        if let Some(id) = self.genome_index.get(&genome) {
            return (*id, false);
        }

        let length = genome.len();
        let serial = self.size_index.get(&length).map_or(0, Vec::len);
        let name = format!("{}-{}", length, serial_string(serial));
        debug!("new genotype {name}: {genome}");

        let id = self.genotypes.len() as GenotypeId;
        self.genome_index.insert(genome.clone(), id);
        self.size_index.entry(length).or_default().push(id);
        self.genotypes.push(InventoryGenotype::new(name, genome));

        self.num_species_ever += 1;
        self.speciation_count += 1;
        (id, true)
    }

    pub fn creature_born(&mut self, id: GenotypeId) {
        self.genotypes[id as usize].creature_born();
        let genotype = &self.genotypes[id as usize];
        if genotype.num_alive() == 1 {
            self.num_species_current += 1;
        }
        if self.listener_alive_threshold > 0
            && genotype.num_alive() >= self.listener_alive_threshold
            && self.notified_genotypes.insert(id)
        {
            let genotype = &self.genotypes[id as usize];
            for listener in &mut self.listeners {
                listener.genotype_reached_threshold(id, genotype);
            }
        }
    }

    pub fn creature_died(&mut self, id: GenotypeId) {
        self.genotypes[id as usize].creature_died();
        if self.genotypes[id as usize].num_alive() == 0 {
            self.num_species_current -= 1;
            self.extinction_count += 1;
            debug!("genotype {} went extinct", self.genotypes[id as usize].name());
        }
    }

    pub fn num_species_ever(&self) -> u32 {
        self.num_species_ever
    }

    pub fn num_species_current(&self) -> u32 {
        self.num_species_current
    }

    pub fn speciation_count(&self) -> u32 {
        self.speciation_count
    }

    pub fn extinction_count(&self) -> u32 {
        self.extinction_count
    }

    pub fn listener_alive_threshold(&self) -> u32 {
        self.listener_alive_threshold
    }

    /// Alive count at which listeners are told about a genotype; zero
    /// disables notification
    pub fn set_listener_alive_threshold(&mut self, threshold: u32) {
        self.listener_alive_threshold = threshold;
    }

    pub fn register_listener(&mut self, listener: Box<dyn InventoryListener>) {
        self.listeners.push(listener);
    }
}

/// Alphabetic serial: 0 -> "aaa", 1 -> "aab", ... then wider past "zzz"
fn serial_string(serial: usize) -> String {
    let mut digits = Vec::new();
    let mut n = serial;
    loop {
        digits.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
        if n == 0 {
            break;
        }
    }
    while digits.len() < 3 {
        digits.push('a');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn genome(instructions: &[crate::instruction::Instruction]) -> Genome {
        Genome::new(instructions.to_vec())
    }

    #[test]
    fn serial_strings() {
        assert_eq!(serial_string(0), "aaa");
        assert_eq!(serial_string(1), "aab");
        assert_eq!(serial_string(25), "aaz");
        assert_eq!(serial_string(26), "aba");
        assert_eq!(serial_string(26 * 26 * 26), "baaa");
    }

    #[test]
    fn enter_is_idempotent() {
        let mut inventory = Inventory::new();
        let (a, new_a) = inventory.enter(genome(&[IncA, IncB]));
        let (b, new_b) = inventory.enter(genome(&[IncA, IncB]));
        assert!(new_a);
        assert!(!new_b);
        assert_eq!(a, b);
        assert_eq!(inventory.num_genotypes(), 1);
        assert_eq!(inventory.speciation_count(), 1);
    }

    #[test]
    fn names_count_per_length() {
        let mut inventory = Inventory::new();
        let (a, _) = inventory.enter(genome(&[IncA, IncB]));
        let (b, _) = inventory.enter(genome(&[IncA, IncC]));
        let (c, _) = inventory.enter(genome(&[IncA, IncB, IncC]));
        assert_eq!(inventory.genotype(a).name(), "2-aaa");
        assert_eq!(inventory.genotype(b).name(), "2-aab");
        assert_eq!(inventory.genotype(c).name(), "3-aaa");
        assert_eq!(inventory.genotypes_of_length(2), &[a, b]);
    }

    #[test]
    fn extinction_and_speciation_counters() {
        let mut inventory = Inventory::new();
        let (id, _) = inventory.enter(genome(&[IncA]));
        inventory.creature_born(id);
        inventory.creature_born(id);
        assert_eq!(inventory.num_species_current(), 1);
        inventory.creature_died(id);
        assert_eq!(inventory.extinction_count(), 0);
        inventory.creature_died(id);
        assert_eq!(inventory.num_species_current(), 0);
        assert_eq!(inventory.extinction_count(), 1);
        assert_eq!(inventory.genotype(id).num_ever_lived(), 2);
    }

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl InventoryListener for Recorder {
        fn genotype_reached_threshold(&mut self, _id: GenotypeId, genotype: &InventoryGenotype) {
            self.0.borrow_mut().push(genotype.name().to_string());
        }
    }

    #[test]
    fn listeners_fire_once_per_genotype() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut inventory = Inventory::new();
        inventory.set_listener_alive_threshold(2);
        inventory.register_listener(Box::new(Recorder(seen.clone())));

        let (id, _) = inventory.enter(genome(&[IncA, IncB]));
        inventory.creature_born(id);
        assert!(seen.borrow().is_empty());
        inventory.creature_born(id);
        assert_eq!(*seen.borrow(), vec!["2-aaa".to_string()]);

        // dropping below and re-crossing the threshold does not re-notify
        inventory.creature_died(id);
        inventory.creature_born(id);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn round_trip_rebuilds_indexes() {
        let mut inventory = Inventory::new();
        let (a, _) = inventory.enter(genome(&[IncA, IncB]));
        let (_b, _) = inventory.enter(genome(&[DecC]));
        inventory.creature_born(a);

        let encoded = serde_json::to_string(&inventory).unwrap();
        let decoded: Inventory = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, inventory);
        assert_eq!(decoded.find(&genome(&[IncA, IncB])), Some(a));
        assert_eq!(decoded.genotypes_of_length(2), &[a]);
    }
}
