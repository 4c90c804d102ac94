//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable pricing and tagging guarantees.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use estimate_core::{
    catalog::{default_services, find_service},
    aggregate::{group, group_by_key, TagEvent},
    items::line_total,
    compute_totals, CustomerVehicle, DiscountSettings, EstimateDraft, ImageGeometry, PartLineItem, Point,
    ServiceCatalogEntry, ServiceLineItem, Size, SnapshotBuilder, VAT_RATE,
};

const EPS: f64 = 1e-9;

fn service(key: &str, price: f64, qty: f64, discount: f64) -> ServiceLineItem {
    ServiceLineItem {
        id: format!("{}-{}", key, price),
        key: key.to_string(),
        name_local: key.to_string(),
        name_alt: None,
        quantity: qty,
        unit_price: price,
        discount_percent: discount,
        tag_id: None,
    }
}

fn catalog_entry(key: &str) -> ServiceCatalogEntry {
    find_service(&default_services(), key).unwrap().clone()
}

fn customer() -> CustomerVehicle {
    CustomerVehicle {
        customer_name: "Noa".to_string(),
        customer_phone: "0521112233".to_string(),
        car_make: "Toyota".to_string(),
        car_model: "Corolla".to_string(),
        car_make_id: Some("toyota".to_string()),
        car_model_id: Some("corolla".to_string()),
        plate: "45-678-90".to_string(),
    }
}

#[test]
fn scenario_a_item_discount() {
    assert_eq!(line_total(100.0, 2.0, 10.0), 180.0);
    assert_eq!(service("dent_repair", 100.0, 2.0, 10.0).line_total(), 180.0);
}

#[test]
fn scenario_b_category_discount() {
    let settings = DiscountSettings {
        services_discount_percent: 10.0,
        ..Default::default()
    };
    let totals = compute_totals(&[service("dent_repair", 100.0, 2.0, 10.0)], &[], &settings);

    assert_eq!(totals.services_items_total, 180.0);
    assert_eq!(totals.services_discounted_subtotal, 162.0);
    assert_eq!(totals.parts_discounted_subtotal, 0.0);
    assert_eq!(totals.vat_amount, 0.0);
    assert_eq!(totals.grand_total, 162.0);
}

#[test]
fn scenario_c_global_discount_and_vat() {
    let settings = DiscountSettings {
        services_discount_percent: 10.0,
        global_discount_percent: 50.0,
        vat_enabled: true,
        ..Default::default()
    };
    let totals = compute_totals(&[service("dent_repair", 100.0, 2.0, 10.0)], &[], &settings);

    assert!((totals.subtotal_after_global_discount - 81.0).abs() < EPS);
    assert!((totals.vat_amount - 14.58).abs() < EPS);
    assert!((totals.grand_total - 95.58).abs() < EPS);
    assert_eq!(totals.vat_rate, VAT_RATE);
}

#[test]
fn scenario_d_group_sums_money() {
    let grouped = group(&[TagEvent::new("dent_repair", 50.0, 1.0), TagEvent::new("dent_repair", 70.0, 2.0)]);
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].total_count, 3.0);
    assert_eq!(grouped[0].total_price, 190.0);
}

#[test]
fn scenario_e_letterbox_edge_rejected() {
    // 3000x2000 photo in a 600x600 view: rendered 600x400 at y = 100, bars above and below
    let geometry = ImageGeometry::new(Size::new(3000.0, 2000.0), Size::new(600.0, 600.0));
    let (draft, photo_id) = EstimateDraft::new().add_photo("file:///hood.jpg", "Hood");
    let entry = catalog_entry("dent_repair");

    for tap in [Point::new(300.0, 99.5), Point::new(300.0, 500.5), Point::new(300.0, 550.0)] {
        assert!(geometry.normalize(tap).is_none());
        assert!(draft.add_tag(&photo_id, tap, &geometry, &entry, None).is_err());
    }
    assert!(draft.photos[0].tags.is_empty());
    assert!(draft.services.is_empty());
}

#[test]
fn invariant_image_edges_belong_to_image() {
    let geometry = ImageGeometry::new(Size::new(3000.0, 2000.0), Size::new(600.0, 600.0));
    let rect = geometry.rendered().unwrap();

    let top_left = geometry.normalize(Point::new(rect.x, rect.y)).unwrap();
    assert_eq!((top_left.x, top_left.y), (0.0, 0.0));
    let bottom_right = geometry.normalize(Point::new(rect.right(), rect.bottom())).unwrap();
    assert_eq!((bottom_right.x, bottom_right.y), (1.0, 1.0));

    let (draft, photo_id) = EstimateDraft::new().add_photo("file:///hood.jpg", "Hood");
    let (draft, _) = draft
        .add_tag(&photo_id, Point::new(300.0, rect.bottom()), &geometry, &catalog_entry("dent_repair"), None)
        .unwrap();
    assert_eq!(draft.photos[0].tags[0].position.y, 1.0);
}

#[test]
fn invariant_line_total_non_negative_and_monotonic() {
    for &(price, qty) in &[(0.0, 0.0), (100.0, 2.0), (12.34, 0.3), (9999.99, 12.0)] {
        let mut previous = f64::INFINITY;
        for tenth in 0..=1000 {
            let d = tenth as f64 / 10.0;
            let total = line_total(price, qty, d);
            assert!(total >= 0.0);
            assert!(total <= previous);
            previous = total;
        }
    }
}

#[test]
fn invariant_grouping_order_independent() {
    let events = vec![
        TagEvent::new("dent_repair", 150.0, 1.0),
        TagEvent::new("paint_panel", 250.0, 2.0),
        TagEvent::new("dent_repair", 0.1, 3.0),
        TagEvent::new("polishing", 99.99, 1.0),
        TagEvent::new("dent_repair", 0.2, 1.0),
        TagEvent::new("paint_panel", 245.5, 0.5),
        TagEvent::new("dent_repair", 1e-3, 7.0),
    ];
    let expected = group_by_key(&events);

    let mut reversed = events.clone();
    reversed.reverse();
    assert_eq!(group_by_key(&reversed), expected);

    for shift in 1..events.len() {
        let mut rotated = events.clone();
        rotated.rotate_left(shift);
        assert_eq!(group_by_key(&rotated), expected);
    }

    let (evens, odds): (Vec<_>, Vec<_>) = events.iter().cloned().enumerate().partition(|(i, _)| i % 2 == 0);
    let interleaved: Vec<TagEvent> = odds.into_iter().chain(evens).map(|(_, e)| e).collect();
    assert_eq!(group_by_key(&interleaved), expected);
}

#[test]
fn invariant_grouping_idempotent() {
    let lines = vec![
        service("dent_repair", 150.0, 1.0, 0.0),
        service("dent_repair", 120.0, 2.0, 10.0),
        service("polishing", 100.0, 1.5, 0.0),
    ];
    let once = group(&lines);
    let twice = group(&once);
    assert_eq!(twice, once);
}

#[test]
fn invariant_discount_decomposition() {
    let services = vec![
        service("dent_repair", 150.0, 1.0, 5.0),
        service("paint_panel", 250.0, 2.5, 12.0),
        service("polishing", 100.0, 1.0, 100.0),
    ];
    let parts = vec![
        PartLineItem { discount_percent: 7.5, ..PartLineItem::new("Bumper clip", 12.0, 3.4) },
        PartLineItem::new("Headlight", 1.0, 410.0),
    ];

    for &(sd, pd, gd) in &[(0.0, 0.0, 0.0), (10.0, 20.0, 5.0), (33.3, 0.0, 99.0), (100.0, 100.0, 100.0)] {
        let settings = DiscountSettings {
            services_discount_percent: sd,
            parts_discount_percent: pd,
            global_discount_percent: gd,
            vat_enabled: true,
        };
        let totals = compute_totals(&services, &parts, &settings);
        let stages = totals.item_discount_savings() + totals.category_discount_savings() + totals.global_discount_savings();

        assert!((totals.raw_total() - totals.subtotal_after_global_discount - stages).abs() < 1e-6);
        assert!((totals.total_discount_amount() - stages).abs() < 1e-6);
        assert!((totals.vat_amount - totals.subtotal_after_global_discount * VAT_RATE).abs() < EPS);
        assert!(totals.grand_total >= 0.0);
    }
}

#[test]
fn invariant_coordinate_round_trip() {
    let geometries = [
        ImageGeometry::new(Size::new(4032.0, 3024.0), Size::new(390.0, 844.0)),
        ImageGeometry::new(Size::new(3024.0, 4032.0), Size::new(1280.0, 720.0)),
        ImageGeometry::new(Size::new(1000.0, 1000.0), Size::new(333.0, 777.0)),
    ];

    for geometry in geometries {
        let rect = geometry.rendered().unwrap();
        for i in 0..10 {
            for j in 0..10 {
                let tap = Point::new(
                    rect.x + rect.width * (i as f64 + 0.5) / 10.0,
                    rect.y + rect.height * (j as f64 + 0.5) / 10.0,
                );
                let pos = geometry.normalize(tap).unwrap();
                assert!((0.0..=1.0).contains(&pos.x) && (0.0..=1.0).contains(&pos.y));

                let back = geometry.denormalize(pos).unwrap();
                assert!((back.x - tap.x).abs() < 1.0);
                assert!((back.y - tap.y).abs() < 1.0);
            }
        }
    }
}

#[test]
fn invariant_tag_position_independent_of_screen() {
    let image = Size::new(4000.0, 3000.0);
    let phone = ImageGeometry::new(image, Size::new(400.0, 800.0));
    let tablet = ImageGeometry::new(image, Size::new(1600.0, 1000.0));

    let (draft, photo_id) = EstimateDraft::new().add_photo("file:///door.jpg", "Door");
    let (draft, _) = draft
        .add_tag(&photo_id, Point::new(100.0, 350.0), &phone, &catalog_entry("dent_repair"), None)
        .unwrap();

    let pos = draft.photos[0].tags[0].position;
    let on_tablet = tablet.denormalize(pos).unwrap();
    // tablet renders 1333.33x1000 at x = 133.33; quarter way across, one third down
    assert!((on_tablet.x - (133.333_333_333 + 1333.333_333_333 * 0.25)).abs() < 1e-6);
    assert!((on_tablet.y - 1000.0 / 3.0).abs() < 1e-6);
    let again = tablet.normalize(on_tablet).unwrap();
    assert!((again.x - pos.x).abs() < 1e-9 && (again.y - pos.y).abs() < 1e-9);
}

#[test]
fn invariant_snapshot_matches_live_totals() {
    let entry = catalog_entry("dent_repair");
    let geometry = ImageGeometry::new(Size::new(1000.0, 1000.0), Size::new(500.0, 500.0));

    let draft = EstimateDraft::new().with_customer(customer());
    let (draft, photo_id) = draft.add_photo("https://cdn.example.com/front.jpg", "Front");
    let (draft, _) = draft.add_tag(&photo_id, Point::new(100.0, 100.0), &geometry, &entry, Some(50.0)).unwrap();
    let (draft, _) = draft.add_tag(&photo_id, Point::new(300.0, 300.0), &geometry, &entry, Some(70.0)).unwrap();
    let tagged_line = draft.services[1].id.clone();
    let draft = draft.set_service_quantity(&tagged_line, 2.0).unwrap();
    let (draft, _) = draft.add_part(PartLineItem::new("Fender liner", 2.0, 35.0)).unwrap();
    let draft = draft.with_discounts(DiscountSettings {
        services_discount_percent: 10.0,
        parts_discount_percent: 0.0,
        global_discount_percent: 50.0,
        vat_enabled: true,
    });

    let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    let record = SnapshotBuilder::new().build(&draft, now).unwrap();
    let totals = draft.totals();

    // services 50 + 140 = 190, parts 70; (171 + 70) * 0.5 = 120.5; VAT 21.69
    assert_eq!(record.services_total, 190.0);
    assert_eq!(record.parts_total, 70.0);
    assert_eq!(record.subtotal_before_vat, 120.5);
    assert_eq!(record.vat_amount, 21.69);
    assert_eq!(record.total_price, 142.19);
    assert!((totals.grand_total - 142.19).abs() < EPS);

    assert_eq!(record.services.len(), 1);
    assert_eq!(record.services[0].count, 3.0);
    assert_eq!(record.services[0].price, 190.0);
    assert_eq!(record.services[0].unit_price, None);
    assert_eq!(record.photos[0].tags.len(), 2);
    assert_eq!(record.photos[0].tags[1].price, 70.0);
    assert_eq!(record.created_at, now);

    // pure: same draft, same instant, same record
    let again = SnapshotBuilder::new().build(&draft, now).unwrap();
    assert_eq!(again.record_hash, record.record_hash);
}

#[test]
fn invariant_invalid_draft_never_builds() {
    let draft = EstimateDraft::new().with_customer(CustomerVehicle {
        plate: String::new(),
        ..customer()
    });
    let err = SnapshotBuilder::new().build(&draft, Utc::now()).unwrap_err();
    assert!(err.to_string().contains("plate"));
}

#[cfg(feature = "test-hooks")]
#[test]
fn invariant_build_calls_validate() {
    use estimate_core::snapshot::{get_validation_call_count, reset_validation_call_count};

    reset_validation_call_count();
    let draft = EstimateDraft::new().with_customer(customer());
    SnapshotBuilder::new().build(&draft, Utc::now()).unwrap();
    assert!(get_validation_call_count() >= 1);
}

#[test]
fn invariant_untrusted_payload_clamped_in_record() {
    let payload = r#"{
        "customer": {"customerName": "Noa", "customerPhone": "0521112233", "plate": "45-678-90"},
        "services": [
            {"id": "s1", "key": "dent_repair", "nameLocal": "Dent", "quantity": -1, "unitPrice": 150},
            {"id": "s2", "key": "polishing", "nameLocal": "Polish", "quantity": 2, "unitPrice": -100,
             "discountPercent": -30}
        ],
        "parts": [
            {"id": "p1", "name": "Mirror", "quantity": -3, "unitPrice": 45, "discountPercent": 250},
            {"id": "p2", "name": "Clip", "quantity": 4, "unitPrice": 2.5, "discountPercent": -5}
        ],
        "photos": [{"id": "ph1", "uri": "https://cdn.example/hood.jpg", "label": "Hood", "tags": [
            {"id": "t1", "photoId": "ph1", "position": {"x": 1.7, "y": -0.4},
             "serviceKey": "dent_repair", "serviceNameLocal": "Dent", "unitPriceAtTagging": 150},
            {"id": "t2", "photoId": "ph1", "position": {"x": -3, "y": 42},
             "serviceKey": "polishing", "serviceNameLocal": "Polish", "unitPriceAtTagging": -1}
        ]}],
        "discounts": {"servicesDiscountPercent": -20, "partsDiscountPercent": 300,
                      "globalDiscountPercent": 180, "vatEnabled": true}
    }"#;
    let draft: EstimateDraft = serde_json::from_str(payload).unwrap();
    let record = SnapshotBuilder::new().build(&draft, Utc::now()).unwrap();

    for tag in record.photos.iter().flat_map(|p| &p.tags) {
        assert!((0.0..=1.0).contains(&tag.x) && (0.0..=1.0).contains(&tag.y), "{:?}", tag);
        assert!(tag.price >= 0.0);
    }
    for service in &record.services {
        assert!(service.count >= 0.0 && service.price >= 0.0);
        assert!(service.discount.map_or(true, |d| (0.0..=100.0).contains(&d)));
    }
    for part in &record.parts {
        assert!(part.quantity >= 0.0 && part.total_price >= 0.0 && part.unit_price >= 0.0);
        assert!(part.discount.map_or(true, |d| (0.0..=100.0).contains(&d)));
    }
    for percent in [
        record.services_discount_percent,
        record.parts_discount_percent,
        record.global_discount_percent,
    ] {
        assert!((0.0..=100.0).contains(&percent));
    }
    for money in [record.total_price, record.services_total, record.parts_total, record.vat_amount] {
        assert!(money >= 0.0);
    }

    // Global discount clamps to 100%, so nothing is charged
    assert_eq!(record.total_price, 0.0);
    assert_eq!(record.parts[0].discount, Some(100.0));
    assert_eq!(record.parts[1].discount, None);
    assert!(record.verify_hash().unwrap());
}
