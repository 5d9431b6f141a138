use codec::Reader;
use models::{
    Aperture, Component, Date, Drawing, DrawingSummary, ExtraPriceType, LapAttachment, Machine,
    MachineDeck, MachineTemplate, Material, Product, Registries, SchemaMaxima, SideIron,
    SideIronType, SummaryCompressionSchema,
};
use protocol::{
    decode_response, encode_component_table, encode_search_results, encode_user_email,
    encode_user_token, ApertureData, ComponentInsert, ComponentInsertData, DatabaseBackup,
    DrawingInsert, DrawingRequest, DrawingType, Envelope, ExtraPriceData, InsertResponse,
    LapSetting, MaterialData, NextDrawing, PriceMode, RequestType, Response, SearchQuery,
    SideIronPriceData, ValueRange,
};

fn test_registries() -> Registries {
    let registries = Registries::new();
    registries.products.source(vec![Product {
        id: 1,
        name: "Rubber Screen Cloth".into(),
    }]);
    registries.apertures.source(vec![Aperture {
        id: 10,
        width: 22.0,
        length: 40.0,
        base_width: 22,
        base_length: 40,
        quantity: 1,
        shape_id: 1,
    }]);
    registries.materials.source(vec![Material {
        id: 20,
        name: "Tan Gum".into(),
        hardness: 40,
        thickness: 10,
    }]);
    registries.side_irons.source(vec![SideIron {
        id: 30,
        side_iron_type: SideIronType::A,
        length: 1800,
        drawing_number: "SI100".into(),
        hyperlink: "side_irons/SI100.pdf".into(),
    }]);
    registries.machines.source(vec![Machine {
        id: 40,
        manufacturer: "Extec".into(),
        model: "S5".into(),
    }]);
    registries.machine_decks.source(vec![MachineDeck {
        id: 50,
        deck: "Top".into(),
    }]);
    registries
}

fn test_drawing() -> Drawing {
    Drawing {
        drawing_number: "A01".into(),
        date: Date::new(2024, 7, 6),
        width: 1000.0,
        length: 2000.0,
        hyperlink: "drawings/A01.pdf".into(),
        machine_template: MachineTemplate {
            machine_handle: 1,
            quantity_on_deck: 1,
            position: String::new(),
            deck_handle: 1,
        },
        product_handle: 1,
        aperture_handle: 1,
        bar_spacings: vec![500.0, 500.0],
        bar_widths: vec![25.0, 50.0, 25.0],
        side_iron_handles: [1, 1],
        top_material_handle: 1,
        ..Default::default()
    }
}

fn assert_sized(envelope: &impl Envelope) -> Vec<u8> {
    let bytes = envelope.to_bytes();
    assert_eq!(bytes.len(), envelope.serialized_size());
    bytes.to_vec()
}

#[test]
fn three_field_search_query_layout() {
    let query = SearchQuery {
        drawing_number: Some("A01".into()),
        width: Some(ValueRange {
            lower: 900,
            upper: 1100,
        }),
        number_of_bars: Some(1),
        ..Default::default()
    };

    let bytes = assert_sized(&query);
    // Tag, then the presence bitmap for drawing number, width and bar count.
    assert_eq!(&bytes[0..4], &1u32.to_le_bytes());
    assert_eq!(&bytes[4..8], &0x00000013u32.to_le_bytes());
    // Body: length-prefixed "A01", two u32 bounds, one u8 bar count.
    assert_eq!(bytes[8], 3);
    assert_eq!(&bytes[9..12], b"A01");
    assert_eq!(&bytes[12..16], &900u32.to_le_bytes());
    assert_eq!(&bytes[16..20], &1100u32.to_le_bytes());
    assert_eq!(bytes[20], 1);
    assert_eq!(bytes.len(), 21);

    let mut r = Reader::new(&bytes);
    assert_eq!(SearchQuery::deserialize(&mut r).unwrap(), query);
}

#[test]
fn search_query_with_every_field_round_trips() {
    let query = SearchQuery {
        drawing_number: Some("ZB45E".into()),
        width: Some(ValueRange {
            lower: 900,
            upper: 1100,
        }),
        length: Some(ValueRange {
            lower: 1800,
            upper: 2200,
        }),
        product_id: Some(1),
        number_of_bars: Some(2),
        aperture_id: Some(10),
        top_thickness_id: Some(20),
        bottom_thickness_id: Some(21),
        date_range: Some(ValueRange {
            lower: Date::new(2023, 1, 1),
            upper: Date::new(2024, 12, 31),
        }),
        side_iron_type: Some(SideIronType::B),
        side_iron_length: Some(1800),
        sidelap_mode: Some(LapSetting::One),
        overlap_mode: Some(LapSetting::Both),
        sidelap_width: Some(ValueRange {
            lower: 25,
            upper: 75,
        }),
        overlap_width: Some(ValueRange {
            lower: 50,
            upper: 100,
        }),
        sidelap_attachment: Some(LapAttachment::Integral),
        overlap_attachment: Some(LapAttachment::Bonded),
        machine_id: Some(40),
        manufacturer: Some("Extec".into()),
        quantity_on_deck: Some(3),
        position: Some("ALL".into()),
        machine_deck_id: Some(50),
    };

    assert_eq!(query.parameter_flags(), 0x003FFFFF);

    let bytes = assert_sized(&query);
    let mut r = Reader::new(&bytes);
    assert_eq!(SearchQuery::deserialize(&mut r).unwrap(), query);
    assert_eq!(r.remaining(), 0);
}

#[test]
fn drawing_request_and_response_round_trip() {
    let registries = test_registries();

    let request = DrawingRequest::new(77, 5);
    let bytes = assert_sized(&request);
    let mut r = Reader::new(&bytes);
    assert_eq!(
        DrawingRequest::deserialize(&mut r, &registries).unwrap(),
        request
    );

    let response = DrawingRequest {
        mat_id: 77,
        echo_code: 5,
        drawing: Some(test_drawing()),
    };
    let bytes = assert_sized(&response);
    let mut r = Reader::new(&bytes);
    assert_eq!(
        DrawingRequest::deserialize(&mut r, &registries).unwrap(),
        response
    );
}

#[test]
fn drawing_insert_round_trips_in_both_directions() {
    let registries = test_registries();

    let request = DrawingInsert::new(test_drawing(), 7, false);
    let bytes = assert_sized(&request);
    let mut r = Reader::new(&bytes);
    let out = DrawingInsert::deserialize(&mut r, &registries).unwrap();
    assert_eq!(out, request);
    assert_eq!(out.response, InsertResponse::None);

    let reply = DrawingInsert {
        response: InsertResponse::DrawingExists,
        echo_code: 7,
        force: false,
        drawing: None,
    };
    let bytes = assert_sized(&reply);
    let mut r = Reader::new(&bytes);
    assert_eq!(DrawingInsert::deserialize(&mut r, &registries).unwrap(), reply);
}

#[test]
fn component_insert_variants_round_trip() {
    let variants = vec![
        ComponentInsertData::None,
        ComponentInsertData::Aperture(ApertureData {
            width: 22.0,
            length: 40.0,
            base_width: 22,
            base_length: 40,
            quantity: 1,
            shape_id: 2,
        }),
        ComponentInsertData::Material(MaterialData {
            name: "Tan Gum".into(),
            hardness: 40,
            thickness: 10,
        }),
        ComponentInsertData::SideIronPrice(SideIronPriceData {
            side_iron_type: SideIronType::C,
            extraflex: true,
            length: 1800.0,
            price: 24.5,
            price_mode: PriceMode::Update,
            screws: 12,
            side_iron_price_id: 3,
        }),
        ComponentInsertData::ExtraPrice(ExtraPriceData {
            price_id: 1,
            price_type: ExtraPriceType::SideIronScrews,
            price: 0.12,
            amount: 100,
            square_metres: 0.0,
        }),
        ComponentInsertData::ExtraPrice(ExtraPriceData {
            price_id: 2,
            price_type: ExtraPriceType::TackybackGlue,
            price: 14.0,
            amount: 0,
            square_metres: 2.5,
        }),
        ComponentInsertData::ExtraPrice(ExtraPriceData {
            price_id: 3,
            price_type: ExtraPriceType::Labour,
            price: 30.0,
            amount: 0,
            square_metres: 0.0,
        }),
    ];

    for data in variants {
        let insert = ComponentInsert::new(data);
        let bytes = assert_sized(&insert);
        let mut r = Reader::new(&bytes);
        let out = ComponentInsert::deserialize(&mut r).unwrap();
        assert_eq!(out, insert);
        assert_eq!(r.remaining(), 0);
    }
}

#[test]
fn component_insert_maps_to_its_source_table() {
    let aperture = ComponentInsert::new(ComponentInsertData::Aperture(ApertureData::default()));
    assert_eq!(
        aperture.source_table(),
        Some(RequestType::SourceApertureTable)
    );
    let none = ComponentInsert::new(ComponentInsertData::None);
    assert_eq!(none.source_table(), None);
}

#[test]
fn backup_and_next_drawing_round_trip() {
    let backup = DatabaseBackup::new("nightly-2024-07-06");
    let bytes = assert_sized(&backup);
    let mut r = Reader::new(&bytes);
    assert_eq!(DatabaseBackup::deserialize(&mut r).unwrap(), backup);

    let request = NextDrawing::new(DrawingType::Manual);
    let bytes = assert_sized(&request);
    let mut r = Reader::new(&bytes);
    assert_eq!(NextDrawing::deserialize(&mut r).unwrap(), request);

    let response = NextDrawing {
        drawing_type: DrawingType::Automatic,
        drawing_number: Some("ZC12".into()),
    };
    let bytes = assert_sized(&response);
    let mut r = Reader::new(&bytes);
    assert_eq!(NextDrawing::deserialize(&mut r).unwrap(), response);
}

#[test]
fn decode_routes_each_tag_to_one_variant() {
    let registries = test_registries();

    let insert_reply = DrawingInsert {
        response: InsertResponse::Success,
        echo_code: 9,
        force: true,
        drawing: None,
    };
    match decode_response(&insert_reply.to_bytes(), &registries).unwrap() {
        Response::InsertResult {
            response,
            echo_code,
        } => {
            assert_eq!(response, InsertResponse::Success);
            assert_eq!(echo_code, 9);
        }
        other => panic!("routed to {other:?}"),
    }

    let email = encode_user_email("engineer@scs-mats.co.uk");
    match decode_response(&email, &registries).unwrap() {
        Response::UserEmail(address) => assert_eq!(address, "engineer@scs-mats.co.uk"),
        other => panic!("routed to {other:?}"),
    }

    let token_bytes = encode_user_token(&[7u8; 32]);
    match decode_response(&token_bytes, &registries).unwrap() {
        Response::RepeatToken(token) => assert_eq!(token, [7u8; 32]),
        other => panic!("routed to {other:?}"),
    }

    match decode_response(&999u32.to_le_bytes(), &registries) {
        Err(protocol::DecodeError::UnknownTag(999)) => {}
        other => panic!("unknown tag decoded as {other:?}"),
    }
}

#[test]
fn table_payload_sources_the_registry() {
    let registries = Registries::new();
    let payload = encode_component_table(
        RequestType::SourceMaterialTable,
        &[
            Material {
                id: 5,
                name: "Tan Gum".into(),
                hardness: 40,
                thickness: 10,
            },
            Material {
                id: 6,
                name: "Black SBR".into(),
                hardness: 60,
                thickness: 8,
            },
        ],
    );

    match decode_response(&payload, &registries).unwrap() {
        Response::TableSourced { table, records } => {
            assert_eq!(table, RequestType::SourceMaterialTable);
            assert_eq!(records, 2);
        }
        other => panic!("routed to {other:?}"),
    }
    assert_eq!(registries.materials.len(), 2);
    assert_eq!(
        registries.materials.find_by_id(6).unwrap().name,
        "Black SBR"
    );
}

#[test]
fn search_results_decode_through_the_schema() {
    let registries = test_registries();
    let schema = SummaryCompressionSchema::from_maxima(&SchemaMaxima {
        max_mat_id: 10_000,
        max_width: 5000.0,
        max_length: 10_000.0,
        max_thickness_handle: 200,
        max_lap_size: 500.0,
        max_aperture_handle: 2000,
        max_bar_spacing_count: 10,
        max_bar_spacing: 500.0,
        max_drawing_number_length: 8,
        max_extra_aperture_count: 4,
    });

    let mut first = DrawingSummary::default();
    first.mat_id = 42;
    first.drawing_number = "A01".into();
    first.set_width(1000.0);
    first.set_length(2000.0);
    first.thickness_handles[0] = 17;
    first.aperture_handle = 5;
    first.add_spacing(250.0);
    first.add_spacing(250.0);

    let mut second = DrawingSummary::default();
    second.mat_id = 43;
    second.drawing_number = "B22".into();
    second.set_width(1500.5);
    second.set_length(3000.0);
    second.thickness_handles = [12, 14];
    second.aperture_handle = 9;
    second.set_lap_size(0, 50.0);
    second.add_extra_aperture(11);

    let payload = encode_search_results(&schema, &[first.clone(), second.clone()]);
    match decode_response(&payload, &registries).unwrap() {
        Response::SearchResults(results) => {
            assert_eq!(results, vec![first, second]);
        }
        other => panic!("routed to {other:?}"),
    }
}
