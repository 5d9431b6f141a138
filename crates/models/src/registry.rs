//! Per-type component registries.
//!
//! A registry owns the hydrated records for one component type and hands out
//! dense opaque handles for them. Domain objects store handles, never
//! records, so refreshing a table never invalidates a drawing that is
//! already open; consumers re-resolve through ID → handle after a refresh.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use codec::Reader;

use crate::components::{
    Aperture, ApertureShape, BackingStrip, Component, ExtraPrice, LabourTime, Machine, MachineDeck,
    Material, PowderCoatingPrice, Product, SideIron, SideIronPrice, Strap,
};

type RefreshCallback = Box<dyn Fn() + Send + Sync>;

struct Table<T> {
    by_handle: HashMap<u32, T>,
    handle_by_id: HashMap<u32, u32>,
    // Handle 0 is reserved to mean "unset".
    next_handle: u32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            by_handle: HashMap::new(),
            handle_by_id: HashMap::new(),
            next_handle: 1,
        }
    }
}

pub struct Registry<T: Component> {
    table: RwLock<Table<T>>,
    callbacks: Mutex<Vec<RefreshCallback>>,
}

impl<T: Component> Default for Registry<T> {
    fn default() -> Self {
        Self {
            table: RwLock::new(Table::default()),
            callbacks: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Component> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the table contents with `records`, then fires every
    /// registered refresh callback. Handles for IDs that survive the
    /// refresh are preserved; new IDs get fresh handles.
    pub fn source(&self, records: Vec<T>) {
        {
            let mut table = self.table.write().unwrap();
            let old_handles = std::mem::take(&mut table.handle_by_id);
            table.by_handle.clear();

            for record in records {
                let id = record.id();
                let handle = match old_handles.get(&id) {
                    Some(&h) => h,
                    None => {
                        let h = table.next_handle;
                        table.next_handle += 1;
                        h
                    }
                };
                table.handle_by_id.insert(id, handle);
                table.by_handle.insert(handle, record);
            }
            tracing::debug!(
                component = T::NAME,
                records = table.by_handle.len(),
                "sourced component table"
            );
        }

        for callback in self.callbacks.lock().unwrap().iter() {
            callback();
        }
    }

    /// Reads a `u32 count | count × record` table payload and sources it.
    pub fn read_table(&self, r: &mut Reader) -> codec::Result<usize> {
        let count = r.read_u32()? as usize;
        let mut records = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            records.push(T::read_record(r)?);
        }
        let sourced = records.len();
        self.source(records);
        Ok(sourced)
    }

    pub fn on_refresh(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.callbacks.lock().unwrap().push(Box::new(callback));
    }

    pub fn get(&self, handle: u32) -> Option<T> {
        self.table.read().unwrap().by_handle.get(&handle).cloned()
    }

    /// Resolves a handle, substituting the type's placeholder when the
    /// handle is unset or dangling.
    pub fn get_or_placeholder(&self, handle: u32) -> T {
        self.get(handle).unwrap_or_else(|| {
            tracing::warn!(component = T::NAME, handle, "unresolved component handle");
            T::placeholder()
        })
    }

    pub fn contains_handle(&self, handle: u32) -> bool {
        handle != 0 && self.table.read().unwrap().by_handle.contains_key(&handle)
    }

    pub fn handle_for_id(&self, id: u32) -> Option<u32> {
        self.table.read().unwrap().handle_by_id.get(&id).copied()
    }

    pub fn id_for_handle(&self, handle: u32) -> Option<u32> {
        self.get(handle).map(|record| record.id())
    }

    pub fn find_by_id(&self, id: u32) -> Option<T> {
        let handle = self.handle_for_id(id)?;
        self.get(handle)
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All live records, ordered by handle. Drives selection widgets.
    pub fn all(&self) -> Vec<(u32, T)> {
        let table = self.table.read().unwrap();
        let mut out: Vec<(u32, T)> = table
            .by_handle
            .iter()
            .map(|(&h, record)| (h, record.clone()))
            .collect();
        out.sort_by_key(|(h, _)| *h);
        out
    }
}

/// One registry per component type, shared across the client behind `Arc`.
#[derive(Default)]
pub struct Registries {
    pub products: Registry<Product>,
    pub apertures: Registry<Aperture>,
    pub aperture_shapes: Registry<ApertureShape>,
    pub materials: Registry<Material>,
    pub side_irons: Registry<SideIron>,
    pub machines: Registry<Machine>,
    pub machine_decks: Registry<MachineDeck>,
    pub backing_strips: Registry<BackingStrip>,
    pub straps: Registry<Strap>,
    pub side_iron_prices: Registry<SideIronPrice>,
    pub extra_prices: Registry<ExtraPrice>,
    pub powder_coating_prices: Registry<PowderCoatingPrice>,
    pub labour_times: Registry<LabourTime>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display name for an aperture handle, resolving its shape.
    pub fn aperture_name(&self, handle: u32) -> String {
        let aperture = self.apertures.get_or_placeholder(handle);
        let shape = self
            .aperture_shapes
            .find_by_id(aperture.shape_id)
            .unwrap_or_else(ApertureShape::placeholder);
        aperture.display_name(Some(&shape))
    }

    /// Material thickness in millimetres for a handle, zero when dangling.
    pub fn material_thickness(&self, handle: u32) -> u32 {
        self.materials.get_or_placeholder(handle).thickness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn material(id: u32, name: &str) -> Material {
        Material {
            id,
            name: name.into(),
            hardness: 40,
            thickness: 10,
        }
    }

    #[test]
    fn handles_are_dense_and_bijective() {
        let registry = Registry::<Material>::new();
        registry.source(vec![material(10, "a"), material(20, "b")]);

        let h10 = registry.handle_for_id(10).unwrap();
        let h20 = registry.handle_for_id(20).unwrap();
        assert_ne!(h10, 0);
        assert_ne!(h20, 0);
        assert_ne!(h10, h20);
        assert_eq!(registry.id_for_handle(h10), Some(10));
        assert_eq!(registry.id_for_handle(h20), Some(20));
    }

    #[test]
    fn refresh_preserves_surviving_handles_and_fires_callbacks() {
        let registry = Registry::<Material>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let observer = fired.clone();
        registry.on_refresh(move || {
            observer.fetch_add(1, Ordering::SeqCst);
        });

        registry.source(vec![material(10, "a"), material(20, "b")]);
        let h10 = registry.handle_for_id(10).unwrap();

        registry.source(vec![material(10, "a2"), material(30, "c")]);
        assert_eq!(registry.handle_for_id(10), Some(h10));
        assert_eq!(registry.get(h10).unwrap().name, "a2");
        assert_eq!(registry.handle_for_id(20), None);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dangling_handle_yields_a_placeholder() {
        let registry = Registry::<Material>::new();
        assert!(!registry.contains_handle(42));
        assert_eq!(registry.get_or_placeholder(42).id, 0);
    }
}
