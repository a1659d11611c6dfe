use std::collections::HashSet;
use std::thread;

use group_roster::db::Database;
use group_roster::engine::{MembershipEngine, MembershipError};
use group_roster::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn register(engine: &MembershipEngine, name: &str, student_id: &str, email: &str) -> Individual {
    engine
        .register_individual(RegisterIndividualInput {
            name: name.to_string(),
            student_id: student_id.to_string(),
            email: email.to_string(),
        })
        .expect("Failed to register")
}

fn found(engine: &MembershipEngine, creator: &str, roster: &str) -> Result<Group, MembershipError> {
    engine.create_group(CreateGroupInput {
        creator_id: creator.to_string(),
        roster: roster.to_string(),
        partial: false,
    })
}

fn snapshot(engine: &MembershipEngine) -> (Vec<Group>, Vec<Individual>) {
    (
        engine.list_groups().expect("Query failed"),
        engine.list_individuals().expect("Query failed"),
    )
}

/// Capacity and uniqueness must hold whenever the engine is at rest.
fn assert_invariants(engine: &MembershipEngine) {
    let (groups, individuals) = snapshot(engine);
    let mut seen = HashSet::new();
    for group in &groups {
        assert!(!group.members.is_empty());
        assert!(group.members.len() <= MAX_GROUP_SIZE);
        assert_eq!(
            group.capacity_remaining as usize,
            MAX_GROUP_SIZE - group.members.len()
        );
        for member in &group.members {
            assert!(seen.insert(member.key()), "{} appears twice", member.student_id);
        }
    }
    for individual in &individuals {
        assert!(seen.insert(individual.key()), "{} appears twice", individual.student_id);
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let engine = MembershipEngine::new(db);
    }

    after {
        assert_invariants(&engine);
    }

    describe "register_individual" {
        it "registers a new student" {
            let individual = register(&engine, "Ada", "S1", "a@x");

            let state = engine.student_state("s1").expect("Lookup failed");
            assert_eq!(state, StudentState::Individual { individual });
        }

        it "rejects a student already registered" {
            register(&engine, "Ada", "S1", "a@x");

            let result = engine.register_individual(RegisterIndividualInput {
                name: "Ada".to_string(),
                student_id: " s1 ".to_string(),
                email: "a@x".to_string(),
            });
            assert!(matches!(result, Err(MembershipError::AlreadyIndividual(_))));
        }

        it "rejects a student already in a group" {
            found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");

            let result = engine.register_individual(RegisterIndividualInput {
                name: "Bob".to_string(),
                student_id: "S2".to_string(),
                email: "b@x".to_string(),
            });
            assert!(matches!(result, Err(MembershipError::AlreadyGrouped(_))));
        }

        it "requires every field" {
            let result = engine.register_individual(RegisterIndividualInput {
                name: "Ada".to_string(),
                student_id: "S1".to_string(),
                email: "  ".to_string(),
            });
            assert!(matches!(result, Err(MembershipError::MissingField("email"))));
        }

        it "rejects names the roster format cannot hold" {
            let result = engine.register_individual(RegisterIndividualInput {
                name: "Ada (A)".to_string(),
                student_id: "S1".to_string(),
                email: "a@x".to_string(),
            });
            assert!(matches!(result, Err(MembershipError::Format(_))));
        }
    }

    describe "create_group" {
        it "absorbs the creator's individual registration" {
            register(&engine, "Ada", "S1", "a@x");

            let group = found(&engine, "S1", "Ada,S1\nBob,S2").expect("Failed to create");

            assert_eq!(group.capacity_remaining, 2);
            assert_eq!(group.members, vec![Member::new("Ada", "S1"), Member::new("Bob", "S2")]);
            assert!(engine.list_individuals().expect("Query failed").is_empty());
            assert!(matches!(
                engine.student_state("S2").expect("Lookup failed"),
                StudentState::Grouped { .. }
            ));
        }

        it "rejects a roster below the size bound without writing" {
            let result = found(&engine, "S1", "Ada, S1");

            assert!(matches!(
                result,
                Err(MembershipError::SizeOutOfRange { count: 1, lo: 2, hi: 4 })
            ));
            assert!(engine.list_groups().expect("Query failed").is_empty());
        }

        it "rejects five founders" {
            let result = found(&engine, "S1", "A, S1\nB, S2\nC, S3\nD, S4\nE, S5");
            assert!(matches!(result, Err(MembershipError::SizeOutOfRange { count: 5, .. })));
        }

        it "caps partial groups at three founders" {
            let result = engine.create_group(CreateGroupInput {
                creator_id: "S1".to_string(),
                roster: "A, S1\nB, S2\nC, S3\nD, S4".to_string(),
                partial: true,
            });
            assert!(matches!(result, Err(MembershipError::SizeOutOfRange { hi: 3, .. })));

            let group = engine
                .create_group(CreateGroupInput {
                    creator_id: "S1".to_string(),
                    roster: "A, S1\nB, S2\nC, S3".to_string(),
                    partial: true,
                })
                .expect("Failed to create");
            assert_eq!(group.capacity_remaining, 1);
        }

        it "requires the creator on the roster" {
            let result = found(&engine, "S9", "Ada, S1\nBob, S2");
            assert!(matches!(result, Err(MembershipError::CreatorNotIncluded(_))));
        }

        it "does not accept a creator id that is only a prefix of a member id" {
            let result = found(&engine, "M010", "Ada, M0101\nBob, M0202");
            assert!(matches!(result, Err(MembershipError::CreatorNotIncluded(_))));
        }

        it "reports invalid roster text" {
            let result = found(&engine, "S1", "Ada S1\nBob, S2");
            assert!(matches!(result, Err(MembershipError::InvalidFormat(_))));
        }

        it "lists every conflicting member" {
            found(&engine, "S3", "Cy, S3\nDee, S4").expect("Failed to create");
            register(&engine, "Eve", "S5", "e@x");

            let result = found(&engine, "S1", "Ada, S1\nCy, S3\nDee, S4\nEve, S5");
            match result {
                Err(MembershipError::MemberConflict { names }) => {
                    assert_eq!(names, vec!["Cy", "Dee", "Eve"]);
                }
                other => panic!("expected MemberConflict, got {other:?}"),
            }
        }

        it "treats a student listed twice as a conflict" {
            let result = found(&engine, "S1", "Ada, S1\nAda again, s1");
            assert!(matches!(result, Err(MembershipError::MemberConflict { .. })));
        }

        it "writes nothing when one candidate conflicts" {
            register(&engine, "Ada", "S1", "a@x");
            register(&engine, "Zed", "S9", "z@x");
            found(&engine, "S5", "Eve, S5\nFay, S6").expect("Failed to create");
            let before = snapshot(&engine);

            let result = found(&engine, "S1", "Ada, S1\nBob, S2\nCy, S3\nEve, S5");
            assert!(matches!(result, Err(MembershipError::MemberConflict { .. })));

            assert_eq!(snapshot(&engine), before);
        }
    }

    describe "add_member" {
        it "moves an individual into the group" {
            let group = found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");
            let cy = register(&engine, "Cy", "S3", "c@x");

            let updated = engine.add_member(group.id, cy.id).expect("Failed to add");

            assert_eq!(updated.capacity_remaining, 1);
            assert_eq!(updated.members.last(), Some(&Member::new("Cy", "S3")));
            assert!(engine.list_individuals().expect("Query failed").is_empty());
        }

        it "rejects a full group" {
            let group = found(&engine, "S1", "A, S1\nB, S2\nC, S3\nD, S4").expect("Failed to create");
            let eve = register(&engine, "Eve", "S5", "e@x");

            let result = engine.add_member(group.id, eve.id);
            assert!(matches!(result, Err(MembershipError::GroupFull(id)) if id == group.id));
            assert_eq!(engine.list_individuals().expect("Query failed").len(), 1);
        }

        it "reports a missing group or individual" {
            let group = found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");

            let no_individual = engine.add_member(group.id, Uuid::new_v4());
            assert!(matches!(no_individual, Err(MembershipError::NotFound { entity: "individual", .. })));

            let cy = register(&engine, "Cy", "S3", "c@x");
            let no_group = engine.add_member(Uuid::new_v4(), cy.id);
            assert!(matches!(no_group, Err(MembershipError::NotFound { entity: "group", .. })));
        }

        it "never overfills a group under concurrent adds" {
            let group = found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");
            let candidates: Vec<Individual> = (3..=8)
                .map(|n| register(&engine, "Cand", &format!("S{n}"), "c@x"))
                .collect();

            let handles: Vec<_> = candidates
                .into_iter()
                .map(|c| {
                    let engine = engine.clone();
                    thread::spawn(move || engine.add_member(group.id, c.id))
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join().expect("thread panicked")).collect();

            let added = results.iter().filter(|r| r.is_ok()).count();
            let full = results
                .iter()
                .filter(|r| matches!(r, Err(MembershipError::GroupFull(_))))
                .count();
            assert_eq!(added, 2);
            assert_eq!(full, 4);

            let stored = engine.find_group(group.id).expect("Query failed").expect("Group missing");
            assert_eq!(stored.members.len(), MAX_GROUP_SIZE);
            assert!(stored.is_full());
        }
    }

    describe "remove_member" {
        it "returns the member to the individuals" {
            let group = found(&engine, "S1", "Ada, S1\nBob, S2\nCy, S3").expect("Failed to create");

            let release = engine.remove_member(group.id, "s2").expect("Failed to remove");

            assert_eq!(release.group.capacity_remaining, 2);
            assert_eq!(release.group.members, vec![Member::new("Ada", "S1"), Member::new("Cy", "S3")]);
            assert_eq!(release.individual.name, "Bob");
            assert_eq!(release.individual.email, UNKNOWN_EMAIL);
        }

        it "protects the last member" {
            let group = found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");
            engine.remove_member(group.id, "S2").expect("Failed to remove");
            let before = snapshot(&engine);

            let result = engine.remove_member(group.id, "S1");

            assert!(matches!(result, Err(MembershipError::LastMemberProtected(id)) if id == group.id));
            assert_eq!(snapshot(&engine), before);
        }

        it "reports a student who is not on the roster" {
            let group = found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");

            let result = engine.remove_member(group.id, "S3");
            assert!(matches!(result, Err(MembershipError::NotFound { entity: "member", .. })));
        }
    }

    describe "switch_group" {
        it "leaves the group and restores the known email" {
            register(&engine, "Ada", "S1", "a@x");
            let group = found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");

            let release = engine.switch_group("S1").expect("Failed to switch");

            assert_eq!(release.group.id, group.id);
            assert_eq!(release.group.members, vec![Member::new("Bob", "S2")]);
            assert_eq!(release.group.capacity_remaining, group.capacity_remaining + 1);
            assert_eq!(release.individual.name, "Ada");
            assert_eq!(release.individual.email, "a@x");
        }

        it "keeps the email of a member added from the individuals" {
            let group = found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");
            let cy = register(&engine, "Cy", "S3", "cy@x");
            engine.add_member(group.id, cy.id).expect("Failed to add");

            let release = engine.switch_group("S3").expect("Failed to switch");
            assert_eq!(release.individual.email, "cy@x");
        }

        it "requires a current group" {
            register(&engine, "Ada", "S1", "a@x");

            let result = engine.switch_group("S1");
            assert!(matches!(result, Err(MembershipError::NotGrouped(_))));
        }
    }

    describe "disband_group" {
        it "releases every member" {
            register(&engine, "Ada", "S1", "a@x");
            let group = found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");

            let released = engine.disband_group(group.id).expect("Failed to disband");

            let emails: Vec<_> = released.iter().map(|i| i.email.as_str()).collect();
            assert_eq!(emails, vec!["a@x", UNKNOWN_EMAIL]);
            assert!(engine.list_groups().expect("Query failed").is_empty());
            assert_eq!(engine.student_state("S2").expect("Lookup failed").as_str(), "individual");
        }
    }

    describe "student_state" {
        it "reports a blank id as unregistered" {
            register(&engine, "Ada", "S1", "a@x");

            assert_eq!(engine.student_state("   ").expect("Lookup failed"), StudentState::Unregistered);
            assert_eq!(engine.student_state("").expect("Lookup failed"), StudentState::Unregistered);
        }
    }

    describe "withdraw_individual" {
        it "removes the registration" {
            register(&engine, "Ada", "S1", "a@x");

            engine.withdraw_individual("S1").expect("Failed to withdraw");
            assert_eq!(engine.student_state("S1").expect("Lookup failed"), StudentState::Unregistered);
        }

        it "reports an unknown student" {
            let result = engine.withdraw_individual("S1");
            assert!(matches!(result, Err(MembershipError::NotFound { entity: "individual", .. })));
        }
    }

    describe "queries" {
        it "searches both collections case-insensitively" {
            found(&engine, "M0101", "Ada Lovelace, M0101\nBob, M0202").expect("Failed to create");
            register(&engine, "Adam", "M0303", "adam@x");

            let results = engine.search("ADA").expect("Search failed");
            assert_eq!(results.groups.len(), 1);
            assert_eq!(results.individuals.len(), 1);

            let by_id = engine.search("m030").expect("Search failed");
            assert!(by_id.groups.is_empty());
            assert_eq!(by_id.individuals[0].name, "Adam");
        }

        it "returns nothing for a blank or unmatched term" {
            register(&engine, "Ada", "S1", "a@x");

            assert!(engine.search("   ").expect("Search failed").is_empty());
            assert!(engine.search("zzz").expect("Search failed").is_empty());
        }

        it "summarizes groups and seats" {
            found(&engine, "S1", "A, S1\nB, S2\nC, S3\nD, S4").expect("Failed to create");
            found(&engine, "S5", "E, S5\nF, S6").expect("Failed to create");
            register(&engine, "G", "S7", "g@x");

            let summary = engine.summary().expect("Summary failed");
            assert_eq!(
                summary,
                RosterSummary {
                    total_groups: 2,
                    full_groups: 1,
                    open_seats: 2,
                    total_individuals: 1,
                }
            );

            let dashboard = engine.dashboard().expect("Dashboard failed");
            assert_eq!(dashboard.partial_groups.len(), 1);
        }

        it "exports one row per member" {
            let group = found(&engine, "S1", "Ada, S1\nBob, S2").expect("Failed to create");

            let rows = engine.export_rows().expect("Export failed");
            assert_eq!(
                rows,
                vec![
                    ExportRow { group_id: group.id, name: "Ada".to_string(), student_id: "S1".to_string() },
                    ExportRow { group_id: group.id, name: "Bob".to_string(), student_id: "S2".to_string() },
                ]
            );
        }
    }
}
