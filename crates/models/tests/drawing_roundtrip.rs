use bytes::BytesMut;
use codec::Reader;
use models::drawing::{build_warning, load_warning};
use models::{
    Aperture, BlankSpace, CentreHole, Coordinate, DamBar, Date, Deflector, Divertor, Drawing,
    Ending, ExtraApertureZone, HookOrientation, ImpactPad, Lap, LapAttachment, Machine,
    MachineDeck, MachineTemplate, Material, Product, Registries, Side, SideIron, SideIronType,
    Strap, TensionType,
};

/// Registries populated so that handles 1..=2 resolve for every component
/// type a drawing can reference.
fn test_registries() -> Registries {
    let registries = Registries::new();
    registries.products.source(vec![
        Product {
            id: 1,
            name: "Rubber Screen Cloth".into(),
        },
        Product {
            id: 2,
            name: "Extraflex".into(),
        },
    ]);
    registries.apertures.source(vec![
        Aperture {
            id: 10,
            width: 22.0,
            length: 40.0,
            base_width: 22,
            base_length: 40,
            quantity: 1,
            shape_id: 1,
        },
        Aperture {
            id: 11,
            width: 30.0,
            length: 0.0,
            base_width: 30,
            base_length: 0,
            quantity: 1,
            shape_id: 2,
        },
    ]);
    registries.materials.source(vec![
        Material {
            id: 20,
            name: "Tan Gum".into(),
            hardness: 40,
            thickness: 10,
        },
        Material {
            id: 21,
            name: "Black SBR".into(),
            hardness: 60,
            thickness: 8,
        },
    ]);
    registries.side_irons.source(vec![
        SideIron {
            id: 30,
            side_iron_type: SideIronType::A,
            length: 1800,
            drawing_number: "SI100".into(),
            hyperlink: "side_irons/SI100.pdf".into(),
        },
        SideIron {
            id: 31,
            side_iron_type: SideIronType::B,
            length: 2000,
            drawing_number: "SI101".into(),
            hyperlink: "side_irons/SI101.pdf".into(),
        },
    ]);
    registries.machines.source(vec![Machine {
        id: 40,
        manufacturer: "Extec".into(),
        model: "S5".into(),
    }]);
    registries.machine_decks.source(vec![MachineDeck {
        id: 50,
        deck: "Top".into(),
    }]);
    registries.straps.source(vec![
        Strap {
            id: 60,
            material_id: 20,
        },
        Strap {
            id: 61,
            material_id: 21,
        },
    ]);
    registries
}

/// The §8 scenario-1 drawing: one bar, no laps, no addons.
fn minimal_drawing() -> Drawing {
    Drawing {
        drawing_number: "A01".into(),
        date: Date::new(2024, 7, 6),
        width: 1000.0,
        length: 2000.0,
        hyperlink: "drawings/A01.pdf".into(),
        notes: String::new(),
        machine_template: MachineTemplate {
            machine_handle: 1,
            quantity_on_deck: 1,
            position: String::new(),
            deck_handle: 1,
        },
        product_handle: 1,
        aperture_handle: 1,
        tension_type: TensionType::Side,
        bar_spacings: vec![500.0, 500.0],
        bar_widths: vec![25.0, 50.0, 25.0],
        side_iron_handles: [1, 1],
        top_material_handle: 1,
        ..Default::default()
    }
}

fn round_trip(drawing: &Drawing, registries: &Registries) -> Drawing {
    let mut buf = BytesMut::new();
    drawing.serialize_into(&mut buf);
    assert_eq!(
        buf.len(),
        drawing.serialized_size(),
        "serialized_size must match the bytes actually written"
    );

    let mut r = Reader::new(&buf);
    let out = Drawing::deserialize(&mut r, registries).unwrap();
    assert_eq!(r.remaining(), 0, "deserialize must consume the whole buffer");
    out
}

#[test]
fn minimal_drawing_layout_and_round_trip() {
    let registries = test_registries();
    let drawing = minimal_drawing();

    let mut buf = BytesMut::new();
    drawing.serialize_into(&mut buf);

    // Leading bytes: the drawing number length, "A01", then the packed
    // date, then width and length as little-endian f32.
    assert_eq!(buf[0], 3);
    assert_eq!(&buf[1..4], b"A01");
    assert_eq!(&buf[4..8], &[0xE8, 0x07, 7, 6]);
    assert_eq!(&buf[8..12], &1000.0f32.to_le_bytes());
    assert_eq!(&buf[12..16], &2000.0f32.to_le_bytes());

    let out = round_trip(&drawing, &registries);
    assert_eq!(out, drawing);
    assert_eq!(out.load_warnings, 0);
    assert_eq!(out.number_of_bars(), 1);

    // Byte-for-byte stability of the re-serialized form.
    let mut again = BytesMut::new();
    out.serialize_into(&mut again);
    assert_eq!(buf, again);
}

#[test]
fn full_featured_drawing_round_trips() {
    let registries = test_registries();
    let mut drawing = minimal_drawing();
    drawing.drawing_number = "ZB45E".into();
    drawing.notes = "Shortened hooks".into();
    drawing.backing_strip_handle = Some(1);
    drawing.rebated = true;
    drawing.tension_type = TensionType::End;
    drawing.press_drawing_hyperlinks =
        vec!["press/ZB45E_1.pdf".into(), "press/ZB45E_2.pdf".into()];
    drawing.side_iron_handles = [1, 2];
    drawing.side_irons_inverted = [true, false];
    drawing.side_irons_cut_down = [false, true];
    drawing.feed_end = Some(Side::Right);
    drawing.endings = [Some(Ending::FixedEnd), None];
    drawing.hook_orientations = [None, Some(HookOrientation::HookDown)];
    drawing.strap_handles = [Some(1), None];
    drawing.sidelaps = [
        Some(Lap {
            width: 50.0,
            attachment: LapAttachment::Integral,
            material_handle: 1,
        }),
        None,
    ];
    drawing.overlaps = [
        None,
        Some(Lap {
            width: 75.0,
            attachment: LapAttachment::Bonded,
            material_handle: 2,
        }),
    ];
    drawing.bottom_material_handle = Some(2);
    drawing.impact_pads = vec![ImpactPad {
        pos: Coordinate { x: 100.0, y: 200.0 },
        width: 300.0,
        length: 400.0,
        material_handle: 1,
        aperture_handle: 1,
    }];
    drawing.dam_bars = vec![DamBar {
        pos: Coordinate { x: 10.0, y: 20.0 },
        width: 30.0,
        length: 600.0,
        material_handle: 2,
    }];
    drawing.blank_spaces = vec![BlankSpace {
        pos: Coordinate { x: 0.0, y: 500.0 },
        width: 250.0,
        length: 100.0,
    }];
    drawing.extra_apertures = vec![ExtraApertureZone {
        pos: Coordinate { x: 50.0, y: 50.0 },
        width: 120.0,
        length: 90.0,
        aperture_handle: 2,
    }];
    drawing.centre_holes = vec![
        CentreHole {
            pos: Coordinate { x: 500.0, y: 700.0 },
            shape_width: 22.0,
            shape_length: 40.0,
            rounded: true,
        },
        CentreHole {
            pos: Coordinate { x: 500.0, y: 900.0 },
            shape_width: 22.0,
            shape_length: 40.0,
            rounded: false,
        },
    ];
    drawing.deflectors = vec![Deflector {
        pos: Coordinate { x: 320.0, y: 40.0 },
        size: 50.0,
        material_handle: 1,
    }];
    drawing.divertors = vec![Divertor {
        side: Side::Right,
        vertical_position: 800.0,
        width: 25.0,
        length: 150.0,
        material_handle: 1,
    }];

    let out = round_trip(&drawing, &registries);
    assert_eq!(out, drawing);
    assert_eq!(out.load_warnings, 0);
}

#[test]
fn bottom_layer_flag_tracks_the_field() {
    let registries = test_registries();

    let without = minimal_drawing();
    let out = round_trip(&without, &registries);
    assert_eq!(out.bottom_material_handle, None);

    let mut with = minimal_drawing();
    with.bottom_material_handle = Some(2);
    let out = round_trip(&with, &registries);
    assert_eq!(out.bottom_material_handle, Some(2));
    // The variant with a bottom layer is exactly four bytes longer.
    assert_eq!(with.serialized_size(), without.serialized_size() + 4);
}

#[test]
fn absent_backing_strip_still_reserves_its_bytes() {
    let mut with = minimal_drawing();
    with.backing_strip_handle = Some(1);
    let without = minimal_drawing();
    assert_eq!(with.serialized_size(), without.serialized_size());
}

#[test]
fn dangling_material_handle_sets_a_load_warning() {
    let registries = test_registries();
    let mut drawing = minimal_drawing();
    drawing.top_material_handle = 99;

    let out = round_trip(&drawing, &registries);
    assert!(out.has_load_warning(load_warning::MISSING_MATERIAL_DETECTED));
    // The placeholder is substituted on access only; the encoded handle and
    // every other field survive untouched.
    assert_eq!(out.top_material_handle, 99);
    assert_eq!(out.top_material(&registries).id, 0);
    assert_eq!(out.drawing_number, drawing.drawing_number);
    assert_eq!(out.bar_spacings, drawing.bar_spacings);
}

#[test]
fn truncated_buffer_is_rejected() {
    let registries = test_registries();
    let drawing = minimal_drawing();
    let mut buf = BytesMut::new();
    drawing.serialize_into(&mut buf);

    for cut in [1, buf.len() / 2, buf.len() - 1] {
        let mut r = Reader::new(&buf[..cut]);
        assert!(
            Drawing::deserialize(&mut r, &registries).is_err(),
            "cut at {cut} must fail"
        );
    }
}

#[test]
fn validation_flags_bad_drawings() {
    let registries = test_registries();

    assert_eq!(minimal_drawing().validate(&registries), 0);

    let mut bad = minimal_drawing();
    bad.drawing_number = "bogus".into();
    bad.width = 0.0;
    bad.bar_spacings = vec![300.0, 300.0]; // no longer sums to width
    bad.machine_template.position = "left".into();
    let warnings = bad.validate(&registries);
    assert_ne!(warnings & build_warning::INVALID_DRAWING_NUMBER, 0);
    assert_ne!(warnings & build_warning::INVALID_WIDTH, 0);
    assert_ne!(warnings & build_warning::INVALID_BAR_SPACINGS, 0);
    assert_ne!(warnings & build_warning::INVALID_MACHINE_POSITION, 0);

    let mut dangling = minimal_drawing();
    dangling.product_handle = 9;
    dangling.aperture_handle = 9;
    let warnings = dangling.validate(&registries);
    assert_ne!(warnings & build_warning::INVALID_PRODUCT, 0);
    assert_ne!(warnings & build_warning::INVALID_APERTURE, 0);
}

#[test]
fn machine_position_pattern() {
    let registries = test_registries();
    for position in ["", "1", "2-4", "ALL"] {
        let mut drawing = minimal_drawing();
        drawing.machine_template.position = position.into();
        assert_eq!(
            drawing.validate(&registries) & build_warning::INVALID_MACHINE_POSITION,
            0,
            "{position:?} should be accepted"
        );
    }
}
