//! Versioned few-shot library: the supported query shapes.
//!
//! Each entry pairs a question with the exact SQL expected for it. The
//! prompt compiler renders the table verbatim and the regression tests
//! replay it, so changing an entry is a contract change: bump
//! [`EXEMPLAR_LIBRARY_VERSION`] with it.

/// Version of the exemplar table, rendered into every SQL prompt.
pub const EXEMPLAR_LIBRARY_VERSION: u32 = 3;

/// Query shape an exemplar demonstrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// COUNT / MAX / GROUP BY
    Aggregate,
    /// Case-insensitive lookup by name, title or position
    Lookup,
    /// unnest() over an array column
    ArrayUnnest,
    /// Several predicates with ORDER BY / LIMIT
    FilteredOrdered,
    /// "member of both X and Y"
    Intersect,
}

/// A (question, expected SQL) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exemplar {
    pub question: &'static str,
    /// Single line, terminated by `;`
    pub sql: &'static str,
    pub shape: QueryShape,
    pub tables: &'static [&'static str],
}

const fn ex(
    question: &'static str,
    sql: &'static str,
    shape: QueryShape,
    tables: &'static [&'static str],
) -> Exemplar {
    Exemplar {
        question,
        sql,
        shape,
        tables,
    }
}

use QueryShape::*;

pub static EXEMPLARS: &[Exemplar] = &[
    ex(
        "How many team members are there in total?",
        "SELECT COUNT(*) FROM teams;",
        Aggregate,
        &["teams"],
    ),
    ex(
        "How many job openings are currently listed?",
        "SELECT COUNT(*) FROM careers;",
        Aggregate,
        &["careers"],
    ),
    ex(
        "How many articles has Rupp Pfalzgraf published?",
        "SELECT COUNT(*) FROM articles WHERE firm ILIKE '%Rupp Pfalzgraf%';",
        Aggregate,
        &["articles"],
    ),
    ex(
        "How many partners are based in Rochester?",
        "SELECT COUNT(*) FROM teams WHERE position ILIKE '%partner%' AND location ILIKE '%Rochester%';",
        Aggregate,
        &["teams"],
    ),
    ex(
        "Who are the founding partners at Hodgson Russ?",
        "SELECT name FROM teams WHERE position ILIKE '%founding partner%' AND firm ILIKE '%Hodgson Russ%';",
        Lookup,
        &["teams"],
    ),
    ex(
        "What is the email address of John Smith?",
        "SELECT name, email FROM teams WHERE name ILIKE '%John Smith%';",
        Lookup,
        &["teams"],
    ),
    ex(
        "List all associates at Rupp Pfalzgraf.",
        "SELECT name, position FROM teams WHERE position ILIKE '%associate%' AND firm ILIKE '%Rupp Pfalzgraf%';",
        Lookup,
        &["teams"],
    ),
    ex(
        "What is Sarah Miller's position?",
        "SELECT name, position, firm FROM teams WHERE name ILIKE '%Sarah Miller%';",
        Lookup,
        &["teams"],
    ),
    ex(
        "Which team members practice corporate law?",
        "SELECT name, position FROM teams WHERE EXISTS (SELECT 1 FROM unnest(practice_areas) AS area WHERE area ILIKE '%corporate%');",
        ArrayUnnest,
        &["teams"],
    ),
    ex(
        "List all distinct practice areas covered by the team.",
        "SELECT DISTINCT unnest(practice_areas) AS practice_area FROM teams ORDER BY practice_area;",
        ArrayUnnest,
        &["teams"],
    ),
    ex(
        "Who graduated from Harvard Law School?",
        "SELECT name FROM teams WHERE EXISTS (SELECT 1 FROM unnest(education) AS school WHERE school ILIKE '%Harvard%');",
        ArrayUnnest,
        &["teams"],
    ),
    ex(
        "Which attorneys are admitted to the New York bar?",
        "SELECT name FROM teams WHERE EXISTS (SELECT 1 FROM unnest(bar_admissions) AS bar WHERE bar ILIKE '%New York%');",
        ArrayUnnest,
        &["teams"],
    ),
    ex(
        "Which articles are tagged with employment law?",
        "SELECT title, author FROM articles WHERE EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE '%employment law%');",
        ArrayUnnest,
        &["articles"],
    ),
    ex(
        "Which team members are in both litigation and real estate?",
        "SELECT name FROM teams WHERE EXISTS (SELECT 1 FROM unnest(practice_areas) AS area WHERE area ILIKE '%litigation%') INTERSECT SELECT name FROM teams WHERE EXISTS (SELECT 1 FROM unnest(practice_areas) AS area WHERE area ILIKE '%real estate%');",
        Intersect,
        &["teams"],
    ),
    ex(
        "Who is admitted to both the New York and Florida bars?",
        "SELECT name FROM teams WHERE EXISTS (SELECT 1 FROM unnest(bar_admissions) AS bar WHERE bar ILIKE '%New York%') INTERSECT SELECT name FROM teams WHERE EXISTS (SELECT 1 FROM unnest(bar_admissions) AS bar WHERE bar ILIKE '%Florida%');",
        Intersect,
        &["teams"],
    ),
    ex(
        "What careers are available in Buffalo?",
        "SELECT title, firm, department FROM careers WHERE location ILIKE '%Buffalo%';",
        Lookup,
        &["careers"],
    ),
    ex(
        "What paralegal positions are open at Rupp Pfalzgraf?",
        "SELECT title, location FROM careers WHERE title ILIKE '%paralegal%' AND firm ILIKE '%Rupp Pfalzgraf%';",
        Lookup,
        &["careers"],
    ),
    ex(
        "List full-time positions requiring at most 3 years of experience.",
        "SELECT title, firm, experience_years FROM careers WHERE employment_type ILIKE '%full-time%' AND experience_years <= 3 ORDER BY experience_years;",
        FilteredOrdered,
        &["careers"],
    ),
    ex(
        "Which jobs offer a minimum salary above 100000?",
        "SELECT title, firm, salary_min, salary_max FROM careers WHERE salary_min > 100000 ORDER BY salary_min DESC;",
        FilteredOrdered,
        &["careers"],
    ),
    ex(
        "What is the highest maximum salary offered?",
        "SELECT MAX(salary_max) FROM careers;",
        Aggregate,
        &["careers"],
    ),
    ex(
        "What are the five most recent job postings?",
        "SELECT title, firm, posted_date FROM careers ORDER BY posted_date DESC LIMIT 5;",
        FilteredOrdered,
        &["careers"],
    ),
    ex(
        "How many jobs are open in each department?",
        "SELECT department, COUNT(*) FROM careers GROUP BY department ORDER BY COUNT(*) DESC;",
        Aggregate,
        &["careers"],
    ),
    ex(
        "Who wrote the article titled Navigating Estate Planning?",
        "SELECT title, author FROM articles WHERE title ILIKE '%Navigating Estate Planning%';",
        Lookup,
        &["articles"],
    ),
    ex(
        "List articles published in 2023 at Hodgson Russ.",
        "SELECT title, author, published_date FROM articles WHERE firm ILIKE '%Hodgson Russ%' AND published_date >= '2023-01-01' AND published_date < '2024-01-01' ORDER BY published_date;",
        FilteredOrdered,
        &["articles"],
    ),
    ex(
        "What practice areas does Hodgson Russ offer?",
        "SELECT name FROM practice_areas WHERE firm ILIKE '%Hodgson Russ%' ORDER BY name;",
        Lookup,
        &["practice_areas"],
    ),
    ex(
        "Who leads the intellectual property practice?",
        "SELECT lead_partner, firm FROM practice_areas WHERE name ILIKE '%intellectual property%';",
        Lookup,
        &["practice_areas"],
    ),
    ex(
        "Which practice area has the most attorneys?",
        "SELECT name, firm, attorney_count FROM practice_areas ORDER BY attorney_count DESC LIMIT 1;",
        FilteredOrdered,
        &["practice_areas"],
    ),
];

/// Exemplar whose question matches `question`, ignoring case and
/// surrounding whitespace.
pub fn find_exemplar(question: &str) -> Option<&'static Exemplar> {
    let needle = question.trim();
    EXEMPLARS
        .iter()
        .find(|e| e.question.eq_ignore_ascii_case(needle))
}

/// Render the library for the SQL prompt.
pub fn render_exemplars(exemplars: &[Exemplar]) -> String {
    exemplars
        .iter()
        .map(|e| format!("Question: {}\nSQL: {}", e.question, e.sql))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_library_shape() {
        assert!(EXEMPLARS.len() >= 25);

        let questions: HashSet<&str> = EXEMPLARS.iter().map(|e| e.question).collect();
        assert_eq!(questions.len(), EXEMPLARS.len(), "duplicate exemplar question");

        for shape in [Aggregate, Lookup, ArrayUnnest, FilteredOrdered, Intersect] {
            assert!(
                EXEMPLARS.iter().any(|e| e.shape == shape),
                "no exemplar for {:?}",
                shape
            );
        }
    }

    #[test]
    fn test_sql_format() {
        for e in EXEMPLARS {
            assert!(e.sql.ends_with(';'), "{}", e.question);
            assert_eq!(e.sql.matches(';').count(), 1, "{}", e.question);
            assert!(!e.sql.contains('\n'), "{}", e.question);
            assert!(!e.sql.to_lowercase().contains("lower("), "{}", e.question);
        }
    }

    #[test]
    fn test_tables_listed_in_sql() {
        for e in EXEMPLARS {
            for table in e.tables {
                assert!(e.sql.contains(table), "{} missing {}", e.question, table);
            }
        }
    }

    #[test]
    fn test_firm_questions_filter_on_firm() {
        for e in EXEMPLARS {
            let names_firm = ["Rupp Pfalzgraf", "Hodgson Russ"]
                .iter()
                .any(|firm| e.question.contains(firm));
            if names_firm {
                assert!(e.sql.contains("firm ILIKE"), "{}", e.question);
            }
        }
    }

    #[test]
    fn test_find_exemplar() {
        let e = find_exemplar("  how many team members are there in total?  ").unwrap();
        assert_eq!(e.sql, "SELECT COUNT(*) FROM teams;");
        assert!(find_exemplar("What is the meaning of life?").is_none());
    }

    #[test]
    fn test_render() {
        let rendered = render_exemplars(&EXEMPLARS[..2]);
        assert_eq!(
            rendered,
            "Question: How many team members are there in total?\nSQL: SELECT COUNT(*) FROM teams;\n\n\
             Question: How many job openings are currently listed?\nSQL: SELECT COUNT(*) FROM careers;"
        );
    }
}
