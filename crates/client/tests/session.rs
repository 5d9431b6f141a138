//! End-to-end session tests against a scripted in-process server: the full
//! handshake, table sourcing, echo-code multiplexing, the insert-then-force
//! retry flow, repeat-token persistence, and orderly disconnect.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use client::crypto::SessionCrypto;
use client::frame::{self, read_frame, FrameKind};
use client::{Client, ClientMeta, Credentials};
use codec::Reader;
use models::{
    Aperture, ApertureShape, Date, Drawing, LabourTime, Machine, MachineDeck, MachineTemplate,
    Material, Product, Registries, SideIron, SideIronType,
};
use protocol::{
    encode_component_table, encode_user_email, encode_user_token, DrawingInsert, DrawingRequest,
    Envelope, InsertResponse, RequestType,
};
use rand::rngs::OsRng;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const SESSION_KEY: [u8; 32] = [9u8; 32];
const SESSION_TOKEN: u64 = 0x1122_3344_5566_7788;
const REPEAT_TOKEN: [u8; 32] = [0xCD; 32];

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    timeout(Duration::from_secs(20), fut).await.expect("timed out")
}

/// Serves the handshake exactly as the production server does, returning
/// the established session crypto.
async fn serve_handshake(
    stream: &mut TcpStream,
    server_key: &RsaPrivateKey,
    signing_key: &SigningKey<Sha256>,
) -> SessionCrypto {
    let client_key_frame = read_frame(stream).await.unwrap();
    assert_eq!(client_key_frame.kind, FrameKind::Key);
    let client_public = RsaPublicKey::from_public_key_der(&client_key_frame.payload).unwrap();

    let server_public = RsaPublicKey::from(server_key);
    let der = server_public.to_public_key_der().unwrap();
    stream
        .write_all(&frame::encode(FrameKind::Key, der.as_bytes()))
        .await
        .unwrap();

    let challenge_frame = read_frame(stream).await.unwrap();
    assert_eq!(challenge_frame.kind, FrameKind::Rsa);
    let challenge = server_key
        .decrypt(Pkcs1v15Encrypt, &challenge_frame.payload)
        .unwrap();
    assert_eq!(challenge.len(), 8);

    let mut payload = Vec::with_capacity(8 + 4 + 32 + 8);
    payload.extend_from_slice(&challenge);
    payload.extend_from_slice(&0xA5A5_A5A5u32.to_le_bytes());
    payload.extend_from_slice(&SESSION_KEY);
    payload.extend_from_slice(&SESSION_TOKEN.to_le_bytes());

    let signature = signing_key.sign(&payload).to_bytes();
    let mut response = client_public
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, &payload)
        .unwrap();
    assert_eq!(response.len(), client_public.size());
    response.extend_from_slice(&signature);
    stream
        .write_all(&frame::encode(FrameKind::Rsa, &response))
        .await
        .unwrap();

    let crypto = SessionCrypto::new(&SESSION_KEY, SESSION_TOKEN);

    let auth_frame = read_frame(stream).await.unwrap();
    assert_eq!(auth_frame.kind, FrameKind::Aes);
    let auth = crypto.open(&auth_frame.payload).unwrap();
    assert_eq!(auth[0], 1, "expected a JWT bind");
    assert_eq!(&auth[1..], b"test-jwt");

    stream
        .write_all(&frame::encode(FrameKind::ConnectionResponse, &[1]))
        .await
        .unwrap();

    crypto
}

async fn send_sealed(stream: &mut TcpStream, crypto: &SessionCrypto, body: &[u8]) {
    stream
        .write_all(&frame::encode(FrameKind::Aes, &crypto.seal(body)))
        .await
        .unwrap();
}

/// The drawing the scripted server returns for every details request.
fn server_drawing() -> Drawing {
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

fn client_registries() -> Registries {
    let registries = Registries::new();
    registries.products.source(vec![Product {
        id: 1,
        name: "Rubber Screen Cloth".into(),
    }]);
    registries.aperture_shapes.source(vec![ApertureShape {
        id: 1,
        shape: "SQ".into(),
    }]);
    registries.apertures.source(vec![Aperture {
        id: 1,
        width: 22.0,
        length: 40.0,
        base_width: 22,
        base_length: 40,
        quantity: 1,
        shape_id: 1,
    }]);
    registries.materials.source(vec![Material {
        id: 1,
        name: "Tan Gum".into(),
        hardness: 40,
        thickness: 10,
    }]);
    registries.side_irons.source(vec![SideIron {
        id: 1,
        side_iron_type: SideIronType::A,
        length: 1800,
        drawing_number: "SI100".into(),
        hyperlink: "side_irons/SI100.pdf".into(),
    }]);
    registries.machines.source(vec![Machine {
        id: 1,
        manufacturer: "Extec".into(),
        model: "S5".into(),
    }]);
    registries.machine_decks.source(vec![MachineDeck {
        id: 1,
        deck: "Top".into(),
    }]);
    registries
}

#[tokio::test]
async fn full_session_against_a_scripted_server() {
    let dir = tempfile::tempdir().unwrap();

    let client_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let server_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let signature_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();

    let key_dir = dir.path().join("keys");
    std::fs::create_dir(&key_dir).unwrap();
    std::fs::write(
        key_dir.join("client_key.pri"),
        client_key.to_pkcs8_pem(LineEnding::LF).unwrap().as_bytes(),
    )
    .unwrap();
    std::fs::write(
        key_dir.join("client_key.pub"),
        RsaPublicKey::from(&client_key)
            .to_public_key_pem(LineEnding::LF)
            .unwrap(),
    )
    .unwrap();
    let signature_path = dir.path().join("server_signature.pub");
    std::fs::write(
        &signature_path,
        RsaPublicKey::from(&signature_key)
            .to_public_key_pem(LineEnding::LF)
            .unwrap(),
    )
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let token_path = dir.path().join("repeat.token");
    let meta = ClientMeta {
        key_path: key_dir,
        server_signature_path: signature_path,
        server_address: "127.0.0.1".into(),
        server_port: port,
        refresh_rate: Some(200.0),
        repeat_token_path: Some(token_path.clone()),
    };

    let details_order = Arc::new(Mutex::new(Vec::<u32>::new()));
    let order_log = details_order.clone();

    let signing_key = SigningKey::<Sha256>::new(signature_key);
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let crypto = serve_handshake(&mut stream, &server_key, &signing_key).await;

        // Push a component table before the client asks for anything.
        let table = encode_component_table(
            RequestType::SourceLabourTimesTable,
            &[
                LabourTime {
                    id: 1,
                    job: "Side iron fitting".into(),
                    time: 30,
                },
                LabourTime {
                    id: 2,
                    job: "Lap bonding".into(),
                    time: 45,
                },
            ],
        );
        send_sealed(&mut stream, &crypto, &table).await;

        let empty = Registries::new();
        loop {
            let frame = match read_frame(&mut stream).await {
                Ok(frame) => frame,
                Err(_) => return false,
            };
            match frame.kind {
                FrameKind::Disconnect => return true,
                FrameKind::Aes => {
                    let body = crypto.open_request(&frame.payload).unwrap();
                    match RequestType::peek(&body).unwrap() {
                        RequestType::DrawingDetails => {
                            let request =
                                DrawingRequest::deserialize(&mut Reader::new(&body), &empty)
                                    .unwrap();
                            order_log.lock().unwrap().push(request.echo_code);
                            let reply = DrawingRequest {
                                mat_id: request.mat_id,
                                echo_code: request.echo_code,
                                drawing: Some(server_drawing()),
                            };
                            send_sealed(&mut stream, &crypto, &reply.to_bytes()).await;
                        }
                        RequestType::DrawingInsert => {
                            let request =
                                DrawingInsert::deserialize(&mut Reader::new(&body), &empty)
                                    .unwrap();
                            let response = if request.force {
                                InsertResponse::Success
                            } else {
                                InsertResponse::DrawingExists
                            };
                            let reply = DrawingInsert {
                                response,
                                echo_code: request.echo_code,
                                force: request.force,
                                drawing: None,
                            };
                            send_sealed(&mut stream, &crypto, &reply.to_bytes()).await;
                        }
                        RequestType::RepeatTokenRequest => {
                            send_sealed(&mut stream, &crypto, &encode_user_token(&REPEAT_TOKEN))
                                .await;
                        }
                        RequestType::UserEmailRequest => {
                            send_sealed(
                                &mut stream,
                                &crypto,
                                &encode_user_email("engineer@scs-mats.co.uk"),
                            )
                            .await;
                        }
                        other => panic!("server script has no handler for {other:?}"),
                    }
                }
                other => panic!("unexpected frame kind {other:?}"),
            }
        }
    });

    let registries = Arc::new(client_registries());
    let mut client = within(Client::connect_with(
        &meta,
        registries.clone(),
        Credentials::Jwt("test-jwt".into()),
    ))
    .await
    .unwrap();
    assert!(client.has_full_access());

    // The pushed labour-times table lands without any request.
    within(async {
        while registries.labour_times.len() != 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert_eq!(
        registries.labour_times.find_by_id(2).unwrap().job,
        "Lap bonding"
    );

    // Three details requests queued back to back leave in enqueue order
    // and multiplex over distinct echo codes.
    let rx1 = client.request_drawing(101, 1);
    let rx2 = client.request_drawing(102, 2);
    let rx3 = client.request_drawing(103, 3);
    let d3 = within(rx3).await.unwrap();
    let d1 = within(rx1).await.unwrap();
    let d2 = within(rx2).await.unwrap();
    assert_eq!((d1.mat_id, d2.mat_id, d3.mat_id), (101, 102, 103));
    assert_eq!(d1.drawing.unwrap().drawing_number, "A01");
    assert_eq!(*details_order.lock().unwrap(), vec![1, 2, 3]);

    // Insert flow: advisory DRAWING_EXISTS, then a forced retry under the
    // same echo code succeeds. The per-echo route fires once per attempt.
    let first = client
        .insert_drawing(server_drawing(), 7, false)
        .unwrap();
    assert_eq!(within(first).await.unwrap(), InsertResponse::DrawingExists);
    let second = client.insert_drawing(server_drawing(), 7, true).unwrap();
    assert_eq!(within(second).await.unwrap(), InsertResponse::Success);

    // A repeat token is delivered and persisted for the next run.
    let token = within(client.request_repeat_token()).await.unwrap();
    assert_eq!(token, REPEAT_TOKEN);
    assert_eq!(client::crypto::read_repeat_token(&token_path), Some(REPEAT_TOKEN));

    let email = within(client.request_user_email()).await.unwrap();
    assert_eq!(email, "engineer@scs-mats.co.uk");

    // An invalid drawing is refused before anything hits the wire.
    let mut bad = server_drawing();
    bad.drawing_number = "not-a-number".into();
    assert!(client.insert_drawing(bad, 8, false).is_err());

    // Orderly shutdown: the server observes the disconnect frame.
    within(client.disconnect()).await;
    assert!(within(server).await.unwrap());
}
