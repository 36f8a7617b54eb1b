//! Cross-component scenarios exercising the parser, the schema-aware
//! normalizer and the renderers together.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use crate::{Ava, CoreSchema, Dn, Error, Filter, LdapUrl, Rdn, Value};

#[test]
fn spacing_is_preserved_in_name_but_not_escaped() {
    let dn = Dn::parse("a = b, c = d").unwrap();
    assert_eq!(dn.name(), "a = b, c = d");
    assert_eq!(dn.escaped(), "a=b,c=d");
    assert_eq!(dn.size(), 2);
}

#[test]
fn escaped_comma_stays_in_the_value() {
    let dn = Dn::parse("cn=Bush\\, Kate,dc=example,dc=com").unwrap();
    assert_eq!(dn.escaped(), "cn=Bush\\, Kate,dc=example,dc=com");
    assert_eq!(dn.rdn().unwrap().value().as_str(), Some("Bush, Kate"));
    assert_eq!(dn.size(), 3);
}

#[test]
fn schema_normalization_folds_types_and_values() {
    let schema = CoreSchema;
    let dn = Dn::with_schema(&schema, "  ou  =  Example ,  ou  =  COM ").unwrap();
    assert_eq!(dn.normalized(), "2.5.4.11=example,2.5.4.11=com");
    assert_eq!(dn.name(), "  ou  =  Example ,  ou  =  COM ");
}

#[test]
fn escaped_sharp_starts_a_plain_value() {
    let dn = Dn::parse("a = \\#this is a sharp").unwrap();
    let value = dn.rdn().unwrap().value();
    assert_eq!(value.as_bytes()[0], b'#');
    assert_eq!(value.as_str(), Some("#this is a sharp"));
    assert_eq!(dn.escaped(), "a=\\#this is a sharp");
}

#[test]
fn hex_string_value_decodes_to_octets() {
    let dn = Dn::parse("a = #0010A0AAFF").unwrap();
    let value = dn.rdn().unwrap().value();
    assert_eq!(value.as_bytes(), &[0x00, 0x10, 0xA0, 0xAA, 0xFF]);
    assert_eq!(dn.escaped(), "a=\\00\\10\\A0\\AA\\FF");
}

#[test]
fn multi_valued_rdns_compare_order_independently() {
    let a = Dn::parse("cn=Kate Bush+sn=Bush,ou=system").unwrap();
    let b = Dn::parse("sn=Bush+cn=Kate Bush,ou=system").unwrap();
    assert_eq!(a, b);

    let schema = CoreSchema;
    let a = Dn::with_schema(&schema, "cn=Kate Bush+sn=Bush,ou=system").unwrap();
    let b = Dn::with_schema(&schema, "sn=Bush+cn=Kate Bush,ou=system").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.normalized(), b.normalized());
}

#[test]
fn trailing_separator_is_reported_with_its_offset() {
    let err = Dn::parse("a=b,").unwrap_err();
    assert_matches!(err, Error::TrailingSeparator { offset: 4 });
}

#[test]
fn avas_sort_by_canonical_type_then_value() {
    let schema = CoreSchema;
    let mut avas = [
        ("cn", "  B  "),
        ("sn", "  c"),
        ("2.5.4.3", "A "),
        ("2.5.4.11", " C  "),
        ("ou", "B "),
        ("ou", "D "),
        ("CN", " "),
    ]
    .map(|(ty, value)| Ava::with_schema(&schema, ty, value).unwrap());
    avas.sort();
    let order: Vec<(&str, Option<&str>)> = avas
        .iter()
        .map(|ava| (ava.attribute_type(), ava.value().as_str()))
        .collect();
    assert_eq!(
        order,
        [
            ("ou", Some("B ")),
            ("2.5.4.11", Some(" C  ")),
            ("ou", Some("D ")),
            ("CN", Some(" ")),
            ("2.5.4.3", Some("A ")),
            ("cn", Some("  B  ")),
            ("sn", Some("  c")),
        ]
    );
}

#[test]
fn name_round_trips_for_every_accepted_input() {
    for input in [
        "",
        "   ",
        "cn=kate",
        "a = b, c = d",
        "cn=Bush\\, Kate,dc=example,dc=com",
        "cn=Kate Bush+sn=Bush,ou=system",
        "a = #0010A0AAFF",
        "cn=\"Bush, Kate\",dc=example",
        "OID.2.5.4.3=kate ; dc=example",
        "cn=ブッシュ",
        "cn=\\ padded\\ ",
    ] {
        let dn = Dn::parse(input).unwrap();
        assert_eq!(dn.name(), input, "name round trip for {input:?}");
    }
}

#[test]
fn escape_round_trips_arbitrary_values() {
    for value in [
        "plain",
        " leading and trailing ",
        "#sharp",
        "comma, plus+ semi; quote\" lt< gt> backslash\\",
        "middle  spaces",
        "ブッシュ",
        "",
        " ",
    ] {
        let encoded = crate::escape::encode_dn_str(value);
        let dn = Dn::parse(&format!("cn={encoded}")).unwrap();
        assert_eq!(
            dn.rdn().unwrap().value().as_str(),
            Some(value),
            "escape round trip for {value:?}"
        );
    }
}

#[test]
fn normalized_form_is_idempotent() {
    let schema = CoreSchema;
    for input in [
        "  ou  =  Example ,  ou  =  COM ",
        "CN = Kate   Bush , dc = Example",
        "cn=Kate+sn=Bush,o=Org",
        "userPassword=#736563726574,dc=example",
    ] {
        let normalized = Dn::with_schema(&schema, input).unwrap().normalized();
        let again = Dn::with_schema(&schema, &normalized).unwrap().normalized();
        assert_eq!(again, normalized, "idempotence for {input:?}");
    }
}

#[test]
fn equality_tracks_the_normalized_form() {
    let schema = CoreSchema;
    let pairs = [
        ("cn=Kate Bush", "CN =  kate   BUSH", true),
        ("ou=People,dc=Example", "OU=people , DC=EXAMPLE", true),
        ("cn=Kate", "cn=Anna", false),
        ("cn=Kate,dc=a", "cn=Kate,dc=b", false),
    ];
    for (left, right, expected) in pairs {
        let left = Dn::with_schema(&schema, left).unwrap();
        let right = Dn::with_schema(&schema, right).unwrap();
        assert_eq!(left == right, expected);
        assert_eq!(left.normalized() == right.normalized(), expected);
    }
}

#[test]
fn ordering_is_total_and_consistent_with_equality() {
    let schema = CoreSchema;
    let dns: Vec<Dn> = [
        "",
        "dc=com",
        "dc=org",
        "cn=anna,dc=com",
        "cn=kate,dc=com",
        "CN = KATE , DC = COM",
        "cn=kate+sn=bush,dc=com",
    ]
    .iter()
    .map(|s| Dn::with_schema(&schema, s).unwrap())
    .collect();

    for a in &dns {
        for b in &dns {
            assert_eq!(a.cmp(b), b.cmp(a).reverse(), "{a} vs {b}");
            assert_eq!(a.cmp(b) == std::cmp::Ordering::Equal, a == b, "{a} vs {b}");
            for c in &dns {
                if a <= b && b <= c {
                    assert!(a <= c, "transitivity broke on {a}, {b}, {c}");
                }
            }
        }
    }
}

#[test]
fn ancestry_is_dual() {
    let pairs = [
        ("dc=com", "cn=kate,dc=com"),
        ("", "cn=kate,dc=com"),
        ("dc=example,dc=com", "ou=people,dc=example,dc=com"),
    ];
    for (ancestor, descendant) in pairs {
        let ancestor = Dn::parse(ancestor).unwrap();
        let descendant = Dn::parse(descendant).unwrap();
        assert!(ancestor.is_ancestor_of(&descendant));
        assert!(descendant.is_descendant_of(&ancestor));
        assert!(!descendant.is_ancestor_of(&ancestor));
    }
}

#[test]
fn dn_serde_uses_the_string_form() {
    let dn = Dn::parse("cn=Kate Bush,dc=example").unwrap();
    let json = serde_json::to_string(&dn).unwrap();
    assert_eq!(json, "\"cn=Kate Bush,dc=example\"");
    let back: Dn = serde_json::from_str(&json).unwrap();
    assert_eq!(back, dn);

    let rdn: Rdn = serde_json::from_str("\"cn=a+sn=b\"").unwrap();
    assert_eq!(rdn.size(), 2);

    let filter: Filter = serde_json::from_str("\"(cn=kate)\"").unwrap();
    assert_eq!(serde_json::to_string(&filter).unwrap(), "\"(cn=kate)\"");
}

#[test]
fn url_reuses_dn_and_filter_machinery() {
    let url = LdapUrl::parse(
        "ldap://ldap.example.com/cn=Bush%5C%2C%20Kate,dc=example?cn,sn?one?(&(cn=kate)(sn=bush))",
    )
    .unwrap();
    assert_eq!(url.dn().rdn().unwrap().value().as_str(), Some("Bush, Kate"));
    assert_eq!(url.attributes(), ["cn", "sn"]);
    assert_matches!(url.filter(), Some(Filter::And(children)) if children.len() == 2);
}

#[test]
fn binding_after_parse_matches_parsing_with_schema() {
    let schema = CoreSchema;
    let input = "CN = Kate Bush , OU = people";
    let parsed_then_bound = Dn::parse(input).unwrap().bind(&schema).unwrap();
    let parsed_aware = Dn::with_schema(&schema, input).unwrap();
    assert_eq!(parsed_then_bound, parsed_aware);
    assert_eq!(parsed_then_bound.normalized(), parsed_aware.normalized());
    assert_eq!(parsed_then_bound.name(), input);
}

#[test]
fn binary_attribute_values_stay_binary() {
    let schema = CoreSchema;
    let dn = Dn::with_schema(&schema, "userPassword=#736563726574,dc=example").unwrap();
    let value = dn.rdn().unwrap().value();
    assert!(value.is_binary());
    assert_eq!(value.as_bytes(), b"secret");
}

#[test]
fn values_round_trip_through_the_wire_form() {
    let schema = CoreSchema;
    let dn = Dn::with_schema(&schema, "cn=Kate Bush+sn=Bush,ou=system").unwrap();
    let mut buf = Vec::new();
    dn.write_to(&mut buf).unwrap();
    let back = Dn::read_from(&mut buf.as_slice()).unwrap();
    assert_eq!(back, dn);
    assert_eq!(back.normalized(), dn.normalized());
    assert_eq!(back.name(), dn.name());
}

#[test]
fn programmatic_construction_matches_parsing() {
    let ava = Ava::new("cn", Value::Text("Bush, Kate".to_owned())).unwrap();
    let dn = Dn::from_rdns(vec![Rdn::new(ava), Rdn::parse("dc=example").unwrap()]);
    assert_eq!(dn.name(), "cn=Bush\\, Kate,dc=example");
    let reparsed = Dn::parse(dn.name()).unwrap();
    assert_eq!(reparsed, dn);
}
