use tracing::warn;

use crate::error::AppError;
use crate::models::{ClassCoordinates, Program};

fn matches(program: &Program, coords: &ClassCoordinates) -> bool {
    coords.group >= 1
        && program.name == coords.name
        && program.licence_level == coords.licence
        && program.semester == coords.semester
        && program.group_count >= coords.group
}

/// Finds the program a parsed class label refers to.
///
/// When several catalog entries match, the first one in catalog order is
/// returned and the collision is logged; callers must not rely on which.
pub fn resolve(coords: &ClassCoordinates, catalog: &[Program]) -> Result<Program, AppError> {
    let mut candidates = catalog.iter().filter(|p| matches(p, coords));

    let Some(first) = candidates.next() else {
        return Err(AppError::ProgramNotFound {
            name: coords.name.clone(),
            licence: coords.licence,
            semester: coords.semester,
            group: coords.group,
        });
    };

    let others: Vec<&str> = candidates.map(|p| p.id.as_str()).collect();
    if !others.is_empty() {
        warn!(
            "ambiguous program for {} L{} S{}: using {}, also matched {:?}",
            coords.name, coords.licence, coords.semester, first.id, others
        );
    }

    Ok(first.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(id: &str, name: &str, licence: u32, semester: u32, groups: u32) -> Program {
        Program {
            id: id.to_string(),
            name: name.to_string(),
            licence_level: licence,
            semester,
            group_count: groups,
        }
    }

    fn coords(name: &str, licence: u32, semester: u32, group: u32) -> ClassCoordinates {
        ClassCoordinates {
            name: name.to_string(),
            licence,
            semester,
            group,
        }
    }

    #[test]
    fn resolves_exact_match_with_enough_groups() {
        let catalog = vec![
            program("p1", "Informatique", 4, 7, 3),
            program("p2", "Génie Civil", 4, 7, 2),
        ];
        let found = resolve(&coords("Génie Civil", 4, 7, 1), &catalog).unwrap();
        assert_eq!(found.id, "p2");
    }

    #[test]
    fn fails_when_group_exceeds_group_count() {
        let catalog = vec![program("p1", "Génie Civil", 4, 7, 0)];
        let err = resolve(&coords("Génie Civil", 4, 7, 1), &catalog).unwrap_err();
        assert!(matches!(err, AppError::ProgramNotFound { group: 1, .. }));
        assert!(err.to_string().contains("Génie Civil"));
    }

    #[test]
    fn fails_on_level_or_semester_mismatch() {
        let catalog = vec![program("p1", "Génie Civil", 4, 7, 2)];
        assert!(resolve(&coords("Génie Civil", 3, 7, 1), &catalog).is_err());
        assert!(resolve(&coords("Génie Civil", 4, 8, 1), &catalog).is_err());
        assert!(resolve(&coords("Genie Civil", 4, 7, 1), &catalog).is_err());
    }

    #[test]
    fn group_zero_never_matches() {
        let catalog = vec![program("p1", "Génie Civil", 4, 7, 2)];
        assert!(resolve(&coords("Génie Civil", 4, 7, 0), &catalog).is_err());
    }

    #[test]
    fn never_returns_program_with_too_few_groups() {
        let catalog = vec![
            program("small", "Génie Civil", 4, 7, 1),
            program("large", "Génie Civil", 4, 7, 3),
        ];
        for group in 1..=4 {
            match resolve(&coords("Génie Civil", 4, 7, group), &catalog) {
                Ok(p) => assert!(p.group_count >= group),
                Err(e) => assert!(matches!(e, AppError::ProgramNotFound { .. })),
            }
        }
    }

    #[test]
    fn ambiguous_match_takes_first_in_catalog_order() {
        let catalog = vec![
            program("a", "Génie Civil", 4, 7, 2),
            program("b", "Génie Civil", 4, 7, 2),
        ];
        assert_eq!(resolve(&coords("Génie Civil", 4, 7, 2), &catalog).unwrap().id, "a");
    }
}
