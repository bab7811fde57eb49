mod common;

use common::*;
use dnssec_health::analysis::{Authentication, GraphFilter, IssueFlag};
use dnssec_health::dns::{CookieState, Name, RData, Record};
use dnssec_health::dnssec::{PolicyFlags, TrustAnchor, TrustAnchorSet, ValidationOutcome};
use dnssec_health::{RunOptions, analyze};

#[test]
fn test_secure_hierarchy() {
    let hierarchy = Hierarchy::new();
    let report = run(&hierarchy.capture().build(), &hierarchy.policy());

    assert_eq!(report.reference_time, NOW);
    assert!(report.failures.is_empty());
    let names: Vec<&str> = report.names.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec![".", "example.", "www.example."]);

    for name in &report.names {
        assert_eq!(name.status.to_string(), ".", "{} should be secure and clean", name.name);
    }

    let www = find(&report, "www.example.");
    assert!(!www.is_apex);
    assert_eq!(www.zone.apex, "example.");
    assert_eq!(www.zone.parent.as_deref(), Some("."));
    assert_eq!(www.zone.ds.len(), 1);
    assert_eq!(www.zone.ds[0].outcome, Some(ValidationOutcome::Valid));
    assert_eq!(www.zone.ds[0].dnskey, Some(hierarchy.child.ksk.tag()));

    let answer = &response(www, "A").answer[0];
    assert_eq!(answer.rrsigs[0].key_tag, hierarchy.child.zsk.tag());
    assert_eq!(answer.rrsigs[0].outcome, ValidationOutcome::Valid);
}

#[test]
fn test_ecdsa_keys_validate() {
    let mut hierarchy = Hierarchy::new();
    hierarchy.child.ksk = Key::ecdsa_p256(257);
    hierarchy.child.zsk = Key::ecdsa_p256(256);

    let report = run(&hierarchy.capture().build(), &hierarchy.policy());
    assert_eq!(find(&report, "www.example.").status.to_string(), ".");
}

#[test]
fn test_ds_without_matching_key_keeps_zone_secure() {
    let hierarchy = Hierarchy::new();
    let stray = Key::ed25519(257);
    let apex = name("example.");
    let ds = hierarchy.root.signed(vec![
        rr("example.", 3600, RData::Ds(hierarchy.child.ds())),
        rr("example.", 3600, RData::Ds(ds_for(&apex, &stray.dnskey))),
    ]);
    let mut capture = hierarchy.skeleton(ds);
    capture.answer(
        &hierarchy.child,
        "www.example.",
        "A",
        hierarchy.child.signed(vec![a("www.example.", "192.0.2.80")]),
    );
    let set = capture.build();

    let report = run(&set, &hierarchy.policy());
    let zone = &find(&report, "example.").zone;
    assert_eq!(zone.status.authentication, Authentication::Secure);
    assert_eq!(zone.status.to_string(), ".!");
    let stray_ds = zone.ds.iter().find(|d| d.key_tag == stray.tag()).unwrap();
    assert_eq!(stray_ds.outcome, Some(ValidationOutcome::Indeterminate));
    assert_eq!(stray_ds.findings[0].code.as_str(), "DS_NO_DNSKEY");

    // The zone's error shows on every name beneath it
    assert_eq!(find(&report, "www.example.").status.to_string(), ".!");

    let multi_signer = PolicyFlags {
        multi_signer: true,
        ..PolicyFlags::default()
    };
    let report = run(&set, &hierarchy.policy_with(multi_signer));
    assert_eq!(find(&report, "www.example.").status.to_string(), ".");
}

#[test]
fn test_bad_ds_digest_is_bogus() {
    let hierarchy = Hierarchy::new();
    let mut ds = hierarchy.child.ds();
    ds.digest[0] ^= 0xff;
    let mut capture = hierarchy.skeleton(hierarchy.root.signed(vec![rr("example.", 3600, RData::Ds(ds))]));
    capture.answer(
        &hierarchy.child,
        "www.example.",
        "A",
        hierarchy.child.signed(vec![a("www.example.", "192.0.2.80")]),
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let www = find(&report, "www.example.");
    assert_eq!(www.zone.status.authentication, Authentication::Bogus);
    assert_eq!(www.zone.ds[0].outcome, Some(ValidationOutcome::Invalid));
    let codes = codes(www);
    assert!(codes.contains(&"DIGEST_INVALID".to_string()));
    assert!(codes.contains(&"NO_TRUSTED_SIGNATURE".to_string()));
    assert_eq!(www.status.to_string(), "!!");
    assert_eq!(response(www, "A").status.authentication, Authentication::Bogus);

    // The root above is unaffected
    assert_eq!(find(&report, ".").status.to_string(), ".");
}

#[test]
fn test_unsupported_ds_digest_is_insecure() {
    let hierarchy = Hierarchy::new();
    let policy = hierarchy.policy().with_digests(&[4]).unwrap();

    let report = run(&hierarchy.capture().build(), &policy);
    let www = find(&report, "www.example.");
    assert_eq!(www.zone.status.authentication, Authentication::Insecure);
    assert_eq!(www.zone.ds[0].outcome, Some(ValidationOutcome::IndeterminateUnknownAlgorithm));
    assert_eq!(www.status.authentication, Authentication::Insecure);
    assert!(codes(www).contains(&"DIGEST_ALGORITHM_NOT_SUPPORTED".to_string()));

    let relaxed = hierarchy
        .policy_with(PolicyFlags {
            enforce_rfc8624: false,
            ..PolicyFlags::default()
        })
        .with_digests(&[4])
        .unwrap();
    let report = run(&hierarchy.capture().build(), &relaxed);
    assert_eq!(find(&report, "www.example.").status.to_string(), "-");
}

#[test]
fn test_ds_key_outside_signing_set_warns() {
    let hierarchy = Hierarchy::new();
    let apex = name("example.");
    let ds = hierarchy.root.signed(vec![
        rr("example.", 3600, RData::Ds(hierarchy.child.ds())),
        rr("example.", 3600, RData::Ds(ds_for(&apex, &hierarchy.child.zsk.dnskey))),
    ]);
    let set = hierarchy.skeleton(ds).build();

    let report = run(&set, &hierarchy.policy());
    let zone = &find(&report, "example.").zone;
    assert_eq!(zone.status.to_string(), ".?");
    assert!(zone.findings.iter().any(|f| f.code.as_str() == "DNSKEY_NOT_IN_SIGNING_SET"));

    let report = run(
        &set,
        &hierarchy.policy_with(PolicyFlags {
            multi_signer: true,
            ..PolicyFlags::default()
        }),
    );
    assert_eq!(find(&report, "example.").zone.status.to_string(), ".");
}

#[test]
fn test_unsigned_data_in_secure_zone() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.skeleton(hierarchy.root.signed_ds(&hierarchy.child));
    capture.answer(&hierarchy.child, "www.example.", "A", vec![a("www.example.", "192.0.2.80")]);

    let report = run(&capture.build(), &hierarchy.policy());
    let www = find(&report, "www.example.");
    let a_response = response(www, "A");
    assert_eq!(a_response.status.to_string(), "!!");
    assert_eq!(a_response.answer[0].findings[0].code.as_str(), "MISSING_RRSIG");

    // The zone itself stays secure; the name carries the response's error
    assert_eq!(www.zone.status.to_string(), ".");
    assert_eq!(www.status.to_string(), ".!");
}

#[test]
fn test_unsigned_ds_is_bogus() {
    let hierarchy = Hierarchy::new();
    let set = hierarchy
        .skeleton(vec![rr("example.", 3600, RData::Ds(hierarchy.child.ds()))])
        .build();

    let report = run(&set, &hierarchy.policy());
    let zone = &find(&report, "example.").zone;
    assert_eq!(zone.status.authentication, Authentication::Bogus);
    assert!(zone.findings.iter().any(|f| f.code.as_str() == "MISSING_RRSIG"));
}

#[test]
fn test_expired_signature() {
    let hierarchy = Hierarchy::new();
    let apex = name("example.");
    let records = vec![a("www.example.", "192.0.2.80")];
    let expired = hierarchy
        .child
        .zsk
        .sign_with(&records, &apex, 2, NOW - 10 * 86_400, NOW - 86_400);
    let mut capture = hierarchy.skeleton(hierarchy.root.signed_ds(&hierarchy.child));
    capture.answer(&hierarchy.child, "www.example.", "A", vec![records[0].clone(), expired]);

    let report = run(&capture.build(), &hierarchy.policy());
    let answer = &response(find(&report, "www.example."), "A").answer[0];
    assert_eq!(answer.status.authentication, Authentication::Bogus);
    assert_eq!(answer.rrsigs[0].outcome, ValidationOutcome::Invalid);
    assert!(answer.rrsigs[0].findings.iter().any(|f| f.code.as_str() == "EXPIRATION_IN_PAST"));
    assert!(answer.findings.iter().any(|f| f.code.as_str() == "NO_VALID_RRSIG"));
}

#[test]
fn test_root_without_matching_anchor() {
    let hierarchy = Hierarchy::new();
    let mut anchors = TrustAnchorSet::empty();
    anchors.insert(TrustAnchor::from_dnskey(Name::root(), Key::ed25519(257).dnskey));
    let policy = dnssec_health::dnssec::Policy::new(anchors);

    let report = run(&hierarchy.capture().build(), &policy);
    let root = find(&report, ".");
    assert_eq!(root.zone.status.authentication, Authentication::Bogus);
    assert!(root.zone.findings.iter().any(|f| f.code.as_str() == "NO_TRUST_ANCHOR_MATCH"));

    // Below a bogus zone nothing can be better
    let www = find(&report, "www.example.");
    assert_eq!(www.zone.status.authentication, Authentication::Bogus);
    assert_eq!(www.status.authentication, Authentication::Bogus);
}

#[test]
fn test_lame_delegation() {
    let hierarchy = Hierarchy::new();
    let mut capture = Capture::default();
    capture.answer(&hierarchy.root, ".", "DNSKEY", hierarchy.root.dnskey_answer());
    capture.answer(&hierarchy.root, "example.", "DS", hierarchy.root.signed_ds(&hierarchy.child));
    capture.respond("example.", "DNSKEY", CHILD_SERVER, "REFUSED", false, Vec::new(), Vec::new());
    capture.no_response("example.", "SOA", "192.0.2.54", "timeout");

    let report = run(&capture.build(), &hierarchy.policy());
    let zone = &find(&report, "example.").zone;
    assert_eq!(zone.status.authentication, Authentication::LameOrIncomplete);
    assert!(zone.delegation.servers.iter().all(|s| s.lame));
    let codes = codes(find(&report, "example."));
    assert!(codes.contains(&"LAME_DELEGATION".to_string()));
    assert!(codes.contains(&"SERVER_UNRESPONSIVE".to_string()));
}

#[test]
fn test_one_working_server_is_enough() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    capture.no_response("example.", "SOA", "192.0.2.54", "timeout");

    let report = run(&capture.build(), &hierarchy.policy());
    let zone = &find(&report, "example.").zone;
    assert_eq!(zone.status.authentication, Authentication::Secure);
    assert_eq!(zone.delegation.servers.len(), 2);
    assert_eq!(zone.status.issues, IssueFlag::Error);
}

#[test]
fn test_private_server_address() {
    let mut hierarchy = Hierarchy::new();
    hierarchy.child.server = "10.0.0.53".to_string();
    let set = hierarchy.capture().build();

    let report = run(&set, &hierarchy.policy());
    let zone = &find(&report, "example.").zone;
    assert_eq!(zone.status.authentication, Authentication::LameOrIncomplete);
    assert_eq!(zone.delegation.servers[0].findings[0].code.as_str(), "PRIVATE_ADDRESS");

    let report = run(
        &set,
        &hierarchy.policy_with(PolicyFlags {
            allow_private_addresses: true,
            ..PolicyFlags::default()
        }),
    );
    assert_eq!(find(&report, "www.example.").status.to_string(), ".");
}

#[test]
fn test_cookie_without_badcookie() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.skeleton(hierarchy.root.signed_ds(&hierarchy.child));
    let transaction = capture.answer(
        &hierarchy.child,
        "www.example.",
        "A",
        hierarchy.child.signed(vec![a("www.example.", "192.0.2.80")]),
    );
    with_cookie(transaction, CookieState::Invalid);
    let set = capture.build();

    let report = run(&set, &hierarchy.policy());
    let a_response = response(find(&report, "www.example."), "A");
    assert_eq!(a_response.status.to_string(), ".!");
    assert_eq!(a_response.findings[0].code.as_str(), "COOKIE_NO_BADCOOKIE");

    let report = run(
        &set,
        &hierarchy.policy_with(PolicyFlags {
            enforce_cookies: false,
            ..PolicyFlags::default()
        }),
    );
    assert_eq!(response(find(&report, "www.example."), "A").status.to_string(), ".");
}

#[test]
fn test_cds_and_cdnskey_checks() {
    let hierarchy = Hierarchy::new();
    let apex = name("example.");
    let child = &hierarchy.child;
    let mut capture = hierarchy.capture();

    let cds = vec![rr("example.", 3600, RData::Cds(ds_for(&apex, &Key::ed25519(257).dnskey)))];
    let mut cds_answer = cds.clone();
    cds_answer.push(child.ksk.sign(&cds, &apex));
    capture.answer(child, "example.", "CDS", cds_answer);

    let cdnskey = vec![rr("example.", 3600, RData::Cdnskey(child.ksk.dnskey.clone()))];
    capture.answer(child, "example.", "CDNSKEY", child.signed(cdnskey));
    let set = capture.build();

    let report = run(&set, &hierarchy.policy());
    let zone = &find(&report, "example.").zone;
    assert_eq!(zone.status.to_string(), ".?");
    let cds = zone.cds.as_ref().unwrap();
    assert_eq!(cds.findings[0].code.as_str(), "CDS_NO_MATCHING_DNSKEY");
    let cdnskey = zone.cdnskey.as_ref().unwrap();
    assert_eq!(cdnskey.findings[0].code.as_str(), "CDNSKEY_NOT_SIGNED_BY_DS_KEY");

    let report = run(
        &set,
        &hierarchy.policy_with(PolicyFlags {
            trust_all_cdnskey_cds: true,
            ..PolicyFlags::default()
        }),
    );
    assert_eq!(find(&report, "example.").zone.status.to_string(), ".");
}

#[test]
fn test_dname_without_cname() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    let dname = vec![rr(
        "old.example.",
        300,
        RData::Dname {
            target: name("example.net."),
        },
    )];
    capture.answer(&hierarchy.child, "www.old.example.", "A", hierarchy.child.signed(dname));

    let report = run(&capture.build(), &hierarchy.policy());
    let a_response = response(find(&report, "www.old.example."), "A");
    assert_eq!(a_response.answer[0].findings[0].code.as_str(), "DNAME_NO_CNAME");
    assert_eq!(a_response.status.to_string(), ".!");
}

#[test]
fn test_malformed_name_is_isolated() {
    let hierarchy = Hierarchy::new();
    let mut set = hierarchy.capture().build();
    let mut bad = set.transactions[0].clone();
    bad.qname = "bad.example.".to_string();
    bad.qtype = "A".to_string();
    if let Some(response) = &mut bad.response {
        response.answer = vec![serde_json::json!({
            "name": "bad.example.", "ttl": 300, "type": "A", "address": "not-an-address"
        })];
    }
    set.transactions.push(bad);

    let report = run(&set, &hierarchy.policy());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name.as_deref(), Some("bad.example."));
    assert_eq!(find(&report, "www.example.").status.to_string(), ".");
    assert!(report.render_text().contains("[!] bad.example."));
}

#[test]
fn test_name_filter_keeps_chain() {
    let hierarchy = Hierarchy::new();
    let options = RunOptions {
        filter: GraphFilter {
            names: [name("www.example.")].into_iter().collect(),
            ..GraphFilter::default()
        },
        ..RunOptions::default()
    };

    let report = analyze(&hierarchy.capture().build(), &hierarchy.policy(), &options);
    assert_eq!(report.names.len(), 1);
    assert_eq!(report.names[0].status.to_string(), ".");
}

#[test]
fn test_reference_time_override() {
    let hierarchy = Hierarchy::new();
    let options = RunOptions {
        reference_time: Some(EXPIRATION + 1),
        ..RunOptions::default()
    };

    let report = analyze(&hierarchy.capture().build(), &hierarchy.policy(), &options);
    assert_eq!(report.reference_time, EXPIRATION + 1);
    assert_eq!(find(&report, ".").zone.status.authentication, Authentication::Bogus);
}

#[test]
fn test_reports_are_deterministic() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    for label in ["a", "b", "c", "d", "e", "f"] {
        let owner = format!("{}.example.", label);
        let records: Vec<Record> = vec![a(&owner, "192.0.2.1")];
        capture.answer(&hierarchy.child, &owner, "A", hierarchy.child.signed(records));
    }
    let set = capture.build();
    let policy = hierarchy.policy();

    let single = analyze(&set, &policy, &RunOptions {
        threads: 1,
        ..RunOptions::default()
    });
    let parallel = analyze(&set, &policy, &RunOptions {
        threads: 4,
        ..RunOptions::default()
    });
    let again = analyze(&set, &policy, &RunOptions::default());

    assert_eq!(single.to_json().unwrap(), parallel.to_json().unwrap());
    assert_eq!(single.to_json().unwrap(), again.to_json().unwrap());
    assert_eq!(single.render_text(), parallel.render_text());
}
