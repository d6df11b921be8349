//! Basic usage example of the rustabnf engine

use rustabnf::{validate_corpus, Grammar};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== rustabnf Basic Usage Example ===\n");

    // Example 1: Greeting
    println!("Example 1: Greeting");
    let grammar1 = Grammar::from_abnf(
        r#"
greeting = "Hello, " name "!"
name     = 1*ALPHA
"#,
    )?;

    let input = "Hello, World!";
    let tree = grammar1.get("greeting")?.parse_all(input)?;
    println!("Input:  '{}'", input);
    println!("Output: {}\n", tree.to_xml(input));

    // Example 2: Date with exact repetitions
    println!("Example 2: Date");
    let grammar2 = Grammar::from_abnf(
        r#"
date  = year "-" month "-" day
year  = 4DIGIT
month = 2DIGIT
day   = 2DIGIT
"#,
    )?;

    let input = "2024-11-20";
    let tree = grammar2.validate("date", input)?;
    println!("Input:  '{}'", input);
    println!("Output: {}\n", tree.to_xml(input));

    // Example 3: Error reporting
    println!("Example 3: Error reporting");
    match grammar2.validate("date", "2024-1x-20") {
        Ok(_) => println!("unexpectedly valid"),
        Err(e) => println!("Error:  {}\n", e),
    }

    // Example 4: Longest match between alternatives
    println!("Example 4: Longest alternative wins");
    let grammar4 = Grammar::from_abnf(
        r#"
token   = keyword / ident
keyword = "if" / "in"
ident   = ALPHA *(ALPHA / DIGIT)
"#,
    )?;

    for input in ["if", "inner"] {
        let tree = grammar4.validate("token", input)?;
        println!("Input:  '{}'", input);
        println!("Output: {}", tree.to_xml(input));
    }
    println!();

    // Example 5: A small corpus
    println!("Example 5: Corpus");
    let validator = grammar2.get("date")?;
    let report = validate_corpus(
        &validator,
        [("first", "1999-12-31"), ("second", "99-12-31"), ("third", "2000-01-01")],
    );
    for outcome in &report.outcomes {
        println!("{}", outcome);
    }
    println!("{}", report);

    Ok(())
}
