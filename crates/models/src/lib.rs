mod date;
pub use date::Date;

pub mod components;
pub use components::{
    Aperture, ApertureShape, BackingStrip, Component, ExtraPrice, ExtraPriceType, LabourTime,
    Machine, MachineDeck, Material, PowderCoatingPrice, Product, SideIron, SideIronPrice,
    SideIronType, Strap,
};

mod registry;
pub use registry::{Registries, Registry};

pub mod drawing;
pub use drawing::{
    BlankSpace, CentreHole, Coordinate, DamBar, Deflector, Divertor, Drawing, Ending,
    ExtraApertureZone, HookOrientation, ImpactPad, Lap, LapAttachment, MachineTemplate, Side,
    TensionType,
};

mod summary;
pub use summary::{DrawingSummary, SchemaMaxima, SummaryCompressionSchema};
