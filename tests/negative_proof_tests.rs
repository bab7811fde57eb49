mod common;

use common::*;
use dnssec_health::analysis::Authentication;
use dnssec_health::dns::{Name, RData, Record, RecordType};
use dnssec_health::dnssec::{PolicyFlags, ProofKind, ProofOutcome};

const APEX_TYPES: [RecordType; 5] = [
    RecordType::NS,
    RecordType::SOA,
    RecordType::RRSIG,
    RecordType::NSEC,
    RecordType::DNSKEY,
];

/// Authority section: signed SOA followed by each record signed on its own
fn authority(zone: &Zone, records: Vec<Record>) -> Vec<Record> {
    let mut out = zone.signed(vec![zone.soa()]);
    for record in records {
        out.extend(zone.signed(vec![record]));
    }
    out
}

#[test]
fn test_nsec_nxdomain_proven() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    capture.respond(
        "nonexistent.example.",
        "A",
        CHILD_SERVER,
        "NXDOMAIN",
        true,
        Vec::new(),
        authority(&hierarchy.child, vec![nsec("example.", "www.example.", &APEX_TYPES)]),
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let name = find(&report, "nonexistent.example.");
    let nxdomain = response(name, "A");
    let proof = nxdomain.negative.as_ref().unwrap();
    assert_eq!(proof.kind, Some(ProofKind::Nsec));
    assert_eq!(proof.outcome, Some(ProofOutcome::Proven));
    assert_eq!(proof.zone, "example.");
    assert_eq!(nxdomain.status.to_string(), ".");
    assert_eq!(name.status.to_string(), ".");
}

#[test]
fn test_nxdomain_without_records_is_bogus() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    capture.respond(
        "nonexistent.example.",
        "A",
        CHILD_SERVER,
        "NXDOMAIN",
        true,
        Vec::new(),
        authority(&hierarchy.child, Vec::new()),
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let nxdomain = response(find(&report, "nonexistent.example."), "A");
    assert_eq!(nxdomain.status.to_string(), "!!");
    assert_eq!(nxdomain.negative.as_ref().unwrap().findings[0].code.as_str(), "NO_PROOF");
}

#[test]
fn test_nsec_not_covering_wildcard() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    // Covers the query name but not *.example.
    capture.respond(
        "nonexistent.example.",
        "A",
        CHILD_SERVER,
        "NXDOMAIN",
        true,
        Vec::new(),
        authority(
            &hierarchy.child,
            vec![nsec("mail.example.", "www.example.", &[RecordType::A, RecordType::RRSIG, RecordType::NSEC])],
        ),
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let proof = response(find(&report, "nonexistent.example."), "A").negative.as_ref().unwrap();
    assert_eq!(proof.outcome, Some(ProofOutcome::NotProven));
    assert!(proof.findings.iter().any(|f| f.code.as_str() == "WILDCARD_NOT_COVERED"));
}

#[test]
fn test_nsec_nodata_proven() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    capture.respond(
        "www.example.",
        "AAAA",
        CHILD_SERVER,
        "NOERROR",
        true,
        Vec::new(),
        authority(
            &hierarchy.child,
            vec![nsec("www.example.", "example.", &[RecordType::A, RecordType::RRSIG, RecordType::NSEC])],
        ),
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let nodata = response(find(&report, "www.example."), "AAAA");
    assert_eq!(nodata.negative.as_ref().unwrap().outcome, Some(ProofOutcome::Proven));
    assert_eq!(nodata.status.to_string(), ".");
}

#[test]
fn test_nodata_with_type_in_bitmap() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    capture.respond(
        "www.example.",
        "A",
        "192.0.2.54",
        "NOERROR",
        true,
        Vec::new(),
        authority(
            &hierarchy.child,
            vec![nsec("www.example.", "example.", &[RecordType::A, RecordType::RRSIG, RecordType::NSEC])],
        ),
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let www = find(&report, "www.example.");
    let nodata = www.responses.iter().find(|r| r.server == "192.0.2.54").unwrap();
    assert_eq!(nodata.status.authentication, Authentication::Bogus);
    assert_eq!(nodata.negative.as_ref().unwrap().findings[0].code.as_str(), "STYPE_IN_BITMAP");
}

fn nsec3_chain(zone: &Zone, iterations: u16, salt: &[u8], opt_out: bool) -> Vec<Record> {
    let apex = zone.apex.clone();
    let www = name("www.example.");
    let mut records = vec![
        nsec3(
            &apex,
            &apex,
            &www,
            iterations,
            salt,
            &[RecordType::NS, RecordType::SOA, RecordType::DNSKEY, RecordType::NSEC3PARAM, RecordType::RRSIG],
        ),
        nsec3(&apex, &www, &apex, iterations, salt, &[RecordType::A, RecordType::RRSIG]),
    ];
    if opt_out {
        for record in &mut records {
            if let RData::Nsec3(nsec3) = &mut record.rdata {
                nsec3.flags = 1;
            }
        }
    }
    records
}

#[test]
fn test_nsec3_nxdomain_and_rfc9276() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    capture.respond(
        "nonexistent.example.",
        "A",
        CHILD_SERVER,
        "NXDOMAIN",
        true,
        Vec::new(),
        authority(&hierarchy.child, nsec3_chain(&hierarchy.child, 5, &[0xab], false)),
    );
    let set = capture.build();

    let report = run(&set, &hierarchy.policy());
    let nxdomain = response(find(&report, "nonexistent.example."), "A");
    let proof = nxdomain.negative.as_ref().unwrap();
    assert_eq!(proof.kind, Some(ProofKind::Nsec3));
    assert_eq!(proof.outcome, Some(ProofOutcome::Proven));
    let codes: Vec<&str> = proof.findings.iter().map(|f| f.code.as_str()).collect();
    assert_eq!(codes, vec!["NSEC3_ITERATIONS", "NSEC3_SALT"]);
    assert_eq!(nxdomain.status.to_string(), ".?");

    let relaxed = hierarchy.policy_with(PolicyFlags {
        enforce_rfc9276: false,
        ..PolicyFlags::default()
    });
    let report = run(&set, &relaxed);
    let nxdomain = response(find(&report, "nonexistent.example."), "A");
    assert_eq!(nxdomain.negative.as_ref().unwrap().outcome, Some(ProofOutcome::Proven));
    assert_eq!(nxdomain.status.to_string(), ".");
}

#[test]
fn test_insecure_delegation_by_nsec_referral() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    let mut referral = vec![rr(
        "insecure.example.",
        3600,
        RData::Ns {
            target: name("ns.insecure.example."),
        },
    )];
    referral.extend(hierarchy.child.signed(vec![nsec(
        "insecure.example.",
        "www.example.",
        &[RecordType::NS, RecordType::RRSIG, RecordType::NSEC],
    )]));
    capture.respond("www.insecure.example.", "A", CHILD_SERVER, "NOERROR", false, Vec::new(), referral);
    capture.respond(
        "www.insecure.example.",
        "A",
        "203.0.113.53",
        "NOERROR",
        true,
        vec![a("www.insecure.example.", "203.0.113.80")],
        Vec::new(),
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let name = find(&report, "www.insecure.example.");
    assert_eq!(name.zone.apex, "insecure.example.");
    assert_eq!(name.zone.status.authentication, Authentication::Insecure);
    let ds_proof = name.zone.ds_proof.as_ref().unwrap();
    assert_eq!(ds_proof.outcome, Some(ProofOutcome::Proven));
    assert_eq!(ds_proof.zone, "example.");
    assert_eq!(name.status.to_string(), "-");

    let referral = name.responses.iter().find(|r| r.server == CHILD_SERVER).unwrap();
    assert_eq!(referral.status.to_string(), ".");
    let answer = name.responses.iter().find(|r| r.server == "203.0.113.53").unwrap();
    assert_eq!(answer.status.to_string(), "-");
}

#[test]
fn test_referral_with_ds_bit_is_bogus() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    let mut referral = vec![rr(
        "insecure.example.",
        3600,
        RData::Ns {
            target: name("ns.insecure.example."),
        },
    )];
    referral.extend(hierarchy.child.signed(vec![nsec(
        "insecure.example.",
        "www.example.",
        &[RecordType::NS, RecordType::DS, RecordType::RRSIG, RecordType::NSEC],
    )]));
    capture.respond("www.insecure.example.", "A", CHILD_SERVER, "NOERROR", false, Vec::new(), referral);

    let report = run(&capture.build(), &hierarchy.policy());
    let zone = &find(&report, "www.insecure.example.").zone;
    assert_eq!(zone.status.authentication, Authentication::Bogus);
    let proof = zone.ds_proof.as_ref().unwrap();
    assert!(proof.findings.iter().any(|f| f.code.as_str() == "REFERRAL_WITH_DS_BIT"));
}

#[test]
fn test_nsec3_opt_out_referral_is_insecure() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    let mut referral = vec![rr(
        "unsigned.example.",
        3600,
        RData::Ns {
            target: name("ns.unsigned.example."),
        },
    )];
    for record in nsec3_chain(&hierarchy.child, 0, &[], true) {
        referral.extend(hierarchy.child.signed(vec![record]));
    }
    capture.respond("www.unsigned.example.", "A", CHILD_SERVER, "NOERROR", false, Vec::new(), referral);

    let report = run(&capture.build(), &hierarchy.policy());
    let name = find(&report, "www.unsigned.example.");
    assert_eq!(name.zone.status.authentication, Authentication::Insecure);
    let referral = response(name, "A");
    let proof = referral.negative.as_ref().unwrap();
    assert!(proof.opt_out);
    assert_eq!(proof.outcome, Some(ProofOutcome::Proven));
    assert_eq!(referral.status.authentication, Authentication::Insecure);
}

#[test]
fn test_wildcard_answer() {
    let hierarchy = Hierarchy::new();
    let apex: Name = name("example.");
    let records = vec![a("foo.example.", "192.0.2.99")];
    let mut answer = records.clone();
    answer.push(hierarchy.child.zsk.sign_with(&records, &apex, 1, INCEPTION, EXPIRATION));

    let mut capture = hierarchy.capture();
    capture.respond(
        "foo.example.",
        "A",
        CHILD_SERVER,
        "NOERROR",
        true,
        answer.clone(),
        hierarchy
            .child
            .signed(vec![nsec("example.", "www.example.", &APEX_TYPES)]),
    );
    capture.respond("foo.example.", "A", "192.0.2.54", "NOERROR", true, answer, Vec::new());

    let report = run(&capture.build(), &hierarchy.policy());
    let foo = find(&report, "foo.example.");

    let proven = foo.responses.iter().find(|r| r.server == CHILD_SERVER).unwrap();
    let rrset = &proven.answer[0];
    assert_eq!(rrset.wildcard_proof.as_ref().unwrap().outcome, Some(ProofOutcome::Proven));
    assert_eq!(proven.status.to_string(), ".");

    let unproven = foo.responses.iter().find(|r| r.server == "192.0.2.54").unwrap();
    let rrset = &unproven.answer[0];
    assert_eq!(rrset.wildcard_proof.as_ref().unwrap().outcome, Some(ProofOutcome::NotProven));
    assert_eq!(unproven.status.to_string(), "!!");
}

/// Records followed by an RRSIG from a key the zone never published
fn signed_by_stray_key(records: Vec<Record>) -> Vec<Record> {
    let stray = Key::ed25519(256);
    let rrsig = stray.sign(&records, &name("example."));
    let mut out = records;
    out.push(rrsig);
    out
}

#[test]
fn test_ds_denial_signed_by_unknown_key_is_bogus() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    let mut referral = vec![rr(
        "insecure.example.",
        3600,
        RData::Ns {
            target: name("ns.insecure.example."),
        },
    )];
    referral.extend(signed_by_stray_key(vec![nsec(
        "insecure.example.",
        "www.example.",
        &[RecordType::NS, RecordType::RRSIG, RecordType::NSEC],
    )]));
    capture.respond("www.insecure.example.", "A", CHILD_SERVER, "NOERROR", false, Vec::new(), referral);

    let report = run(&capture.build(), &hierarchy.policy());
    let name = find(&report, "www.insecure.example.");
    assert_eq!(name.zone.status.authentication, Authentication::Bogus);
    let proof = name.zone.ds_proof.as_ref().unwrap();
    assert_eq!(proof.outcome, Some(ProofOutcome::Indeterminate));
    assert!(proof.findings.iter().any(|f| f.code.as_str() == "NO_VALID_RRSIG"));
    assert!(name.status.to_string().starts_with('!'));
}

#[test]
fn test_nxdomain_signed_by_unknown_key_is_bogus() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    let mut authority = hierarchy.child.signed(vec![hierarchy.child.soa()]);
    authority.extend(signed_by_stray_key(vec![nsec("example.", "www.example.", &APEX_TYPES)]));
    capture.respond(
        "nonexistent.example.",
        "A",
        CHILD_SERVER,
        "NXDOMAIN",
        true,
        Vec::new(),
        authority,
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let nxdomain = response(find(&report, "nonexistent.example."), "A");
    assert_eq!(nxdomain.negative.as_ref().unwrap().outcome, Some(ProofOutcome::Indeterminate));
    assert_eq!(nxdomain.status.to_string(), "!!");
}

#[test]
fn test_mixed_denial_in_secure_zone_is_bogus() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    let mut records = vec![nsec("example.", "www.example.", &APEX_TYPES)];
    records.extend(nsec3_chain(&hierarchy.child, 0, &[], false));
    capture.respond(
        "nonexistent.example.",
        "A",
        CHILD_SERVER,
        "NXDOMAIN",
        true,
        Vec::new(),
        authority(&hierarchy.child, records),
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let nxdomain = response(find(&report, "nonexistent.example."), "A");
    let proof = nxdomain.negative.as_ref().unwrap();
    assert_eq!(proof.outcome, Some(ProofOutcome::Indeterminate));
    assert!(proof.findings.iter().any(|f| f.code.as_str() == "MIXED_DENIAL_TYPES"));
    assert_eq!(nxdomain.status.to_string(), "!!");
}

#[test]
fn test_unsupported_nsec3_hash_is_insecure() {
    let hierarchy = Hierarchy::new();
    let mut capture = hierarchy.capture();
    let mut records = nsec3_chain(&hierarchy.child, 0, &[], false);
    for record in &mut records {
        if let RData::Nsec3(nsec3) = &mut record.rdata {
            nsec3.hash_algorithm = 2;
        }
    }
    capture.respond(
        "nonexistent.example.",
        "A",
        CHILD_SERVER,
        "NXDOMAIN",
        true,
        Vec::new(),
        authority(&hierarchy.child, records),
    );

    let report = run(&capture.build(), &hierarchy.policy());
    let nxdomain = response(find(&report, "nonexistent.example."), "A");
    let proof = nxdomain.negative.as_ref().unwrap();
    assert_eq!(proof.outcome, Some(ProofOutcome::Indeterminate));
    assert!(proof.findings.iter().any(|f| f.code.as_str() == "UNSUPPORTED_NSEC3_ALGORITHM"));
    assert_eq!(nxdomain.status.authentication, Authentication::Insecure);
}
