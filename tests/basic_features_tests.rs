use calcsession::Session;
use std::error::Error;

//----------------------------------------------------------------------
// Literals
//----------------------------------------------------------------------

#[test]
fn evaluates_numeric_literal() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("42")?, 42.0);
    Ok(())
}

#[test]
fn evaluates_decimal_literal() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("12.375")?, 12.375);
    Ok(())
}

#[test]
fn folds_hex_octal_and_binary_literals() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("(0xFF)")?, 255.0);
    assert_eq!(session.parse("(0o777)")?, 511.0);
    assert_eq!(session.parse("(0b100)")?, 4.0);
    Ok(())
}

#[test]
fn folds_scientific_notation() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("1.5e2")?, 150.0);
    Ok(())
}

//----------------------------------------------------------------------
// Arithmetic and precedence
//----------------------------------------------------------------------

#[test]
fn evaluates_basic_arithmetic() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("2 + 3")?, 5.0);
    assert_eq!(session.parse("5 - 2")?, 3.0);
    assert_eq!(session.parse("3 * 4")?, 12.0);
    assert_eq!(session.parse("10 / 2")?, 5.0);
    Ok(())
}

#[test]
fn respects_operator_precedence() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("2 + 3 * 4")?, 14.0);
    assert_eq!(session.parse("2 * 3 + 4")?, 10.0);
    assert_eq!(session.parse("(2 + 3) * 4")?, 20.0);
    Ok(())
}

#[test]
fn is_left_associative_for_every_operator_including_power() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    // Left-associative ^: (2^3)^2 = 64, not 2^(3^2) = 512.
    assert_eq!(session.parse("2^3^2")?, 64.0);
    Ok(())
}

#[test]
fn handles_unary_minus_with_precedence() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("-5")?, -5.0);
    assert_eq!(session.parse("--5")?, 5.0);
    assert_eq!(session.parse("-5^2")?, -25.0); // unary binds looser than ^
    assert_eq!(session.parse("2*-3^2")?, -18.0);
    Ok(())
}

#[test]
fn evaluates_nested_parentheses() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("(2 + 3) * (4 - 1)")?, 15.0);
    assert_eq!(session.parse("2 * (3 + (4 * 5))")?, 46.0);
    Ok(())
}

#[test]
fn empty_parens_raise_unbalanced_parentheses() {
    let mut session = Session::create();
    assert!(session.parse("()").is_err());
}

#[test]
fn unbalanced_parens_are_detected() {
    let mut session = Session::create();
    assert!(session.parse("(2 + 3").is_err());
    assert!(session.parse("2 + 3)").is_err());
}

#[test]
fn parenthesising_a_whole_expression_is_a_no_op() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    let s = "2 + 3 * 4 - 1";
    let plain = session.parse(s)?;
    let wrapped = session.parse(&format!("({})", s))?;
    assert_eq!(plain, wrapped);
    Ok(())
}

#[test]
fn modulo_and_power() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("10 % 3")?, 1.0);
    assert_eq!(session.parse("2 ^ 3")?, 8.0);
    Ok(())
}

#[test]
fn division_by_zero_yields_infinity() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.set_round_enabled(false);
    assert_eq!(session.parse("1/0")?, f64::INFINITY);
    assert_eq!(session.parse("-1/0")?, f64::NEG_INFINITY);
    assert!(session.parse("0/0")?.is_nan());
    Ok(())
}

//----------------------------------------------------------------------
// Implicit multiplication and postfix factorial
//----------------------------------------------------------------------

#[test]
fn implicit_multiplication_before_parens_and_coefficients() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("3(4+5)")?, 27.0);
    assert_eq!(session.parse("2(3)(4)")?, 24.0);
    Ok(())
}

#[test]
fn postfix_factorial() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("5!/4")?, 30.0);
    assert_eq!(session.parse("(0b100)!")?, 24.0);
    assert_eq!(session.parse("0!")?, 1.0);
    Ok(())
}

#[test]
fn degree_suffix_converts_to_radians() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    let value = session.parse("sin(3pi/2) + tan(45°)")?;
    assert!(value.abs() < 1e-6);
    Ok(())
}

//----------------------------------------------------------------------
// Variables and declarations
//----------------------------------------------------------------------

#[test]
fn declares_and_uses_a_variable() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("x = 42")?;
    assert_eq!(session.parse("x")?, 42.0);
    Ok(())
}

#[test]
fn variables_compose_in_expressions() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("x = 5")?;
    session.add_expression("y = 3")?;
    assert_eq!(session.parse("x + y")?, 8.0);
    assert_eq!(session.parse("x * y")?, 15.0);
    Ok(())
}

#[test]
fn redeclaring_a_variable_overwrites_its_definition() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("x = 5")?;
    assert_eq!(session.parse("x")?, 5.0);
    session.add_expression("x = 10")?;
    assert_eq!(session.parse("x")?, 10.0);
    Ok(())
}

#[test]
fn ambiguous_identifier_prefers_longest_known_variable() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("xy = 100")?;
    // No standalone "x" or "y" declared, so "xy" must resolve whole.
    assert_eq!(session.parse("xy")?, 100.0);
    Ok(())
}

#[test]
fn unknown_identifier_splits_into_known_factors() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("x = 5")?;
    session.add_expression("y = 3")?;
    assert_eq!(session.parse("xy")?, 15.0);
    Ok(())
}

#[test]
fn unresolved_identifier_is_a_variable_not_found_error() {
    let mut session = Session::create();
    let err = session.parse("totallyUnknownName").unwrap_err();
    assert!(err.is_variable_not_found());
    assert_eq!(err.missing_variable(), Some("totallyUnknownName"));
}

#[test]
fn suggests_the_closest_declared_variable() {
    let mut session = Session::create();
    session.add_expression("radius = 5").unwrap();
    let err = session.parse("raduis").unwrap_err();
    assert!(err.to_string().contains("radius"));
}

//----------------------------------------------------------------------
// Rounding policy
//----------------------------------------------------------------------

#[test]
fn rounds_to_the_configured_scale() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.set_round_scale(2);
    assert_eq!(session.parse("1/3")?, 0.33);
    Ok(())
}

#[test]
fn rounding_can_be_disabled() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.set_round_enabled(false);
    let value = session.parse("1/3")?;
    assert!((value - 1.0 / 3.0).abs() < 1e-15);
    Ok(())
}
