use calcsession::Session;
use std::error::Error;

//----------------------------------------------------------------------
// Built-in function library
//----------------------------------------------------------------------

#[test]
fn trigonometric_family() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert!((session.parse("sin(pi/2)")? - 1.0).abs() < 1e-6);
    assert!((session.parse("cos(0)")? - 1.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn logs_and_roots() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("sqrt(9)")?, 3.0);
    assert_eq!(session.parse("sqrt(16)")?, 4.0);
    assert_eq!(session.parse("cbrt(-8)")?, -2.0);
    assert!((session.parse("log(100)")? - 2.0).abs() < 1e-9);
    assert!((session.parse("log(8,2)")? - 3.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn parametric_function_names() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert!((session.parse("log2((0xFF)+1)")? - 8.0).abs() < 1e-9);
    assert_eq!(session.parse("radical3(27)")?, 3.0);
    Ok(())
}

#[test]
fn radical_preserves_sign_of_odd_roots() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("radical(3,-8)")?, -2.0);
    assert!(session.parse("radical(2,-4)").is_err());
    Ok(())
}

#[test]
fn aggregate_functions_are_variadic() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("max(1,5,3)")?, 5.0);
    assert_eq!(session.parse("min(1,5,3)")?, 1.0);
    assert_eq!(session.parse("sum(1,2,3,4)")?, 10.0);
    assert_eq!(session.parse("avg(2,4,6)")?, 4.0);
    Ok(())
}

#[test]
fn gcd_is_variadic_and_euclidean() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("gcd(8,20)")?, 4.0);
    assert_eq!(session.parse("gcd(8,20,100,150)")?, 2.0);
    Ok(())
}

#[test]
fn binomial_coefficient() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("c(5,2)")?, 10.0);
    assert_eq!(session.parse("c(5,0)")?, 1.0);
    Ok(())
}

#[test]
fn bitwise_family_truncates_to_integer() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    assert_eq!(session.parse("and(6,3)")?, 2.0);
    assert_eq!(session.parse("or(6,1)")?, 7.0);
    assert_eq!(session.parse("xor(5,3)")?, 6.0);
    assert_eq!(session.parse("shiftleft(1,4)")?, 16.0);
    assert_eq!(session.parse("shiftright(16,4)")?, 1.0);
    Ok(())
}

#[test]
fn wrong_argument_count_is_reported() {
    let mut session = Session::create();
    let err = session.parse("sin(1,2)").unwrap_err();
    assert!(!err.is_variable_not_found());
}

//----------------------------------------------------------------------
// User-defined functions
//----------------------------------------------------------------------

#[test]
fn declares_and_calls_a_user_function() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("f(x,y)=2(x+y)")?;
    session.add_expression("x0=1+2^2")?;
    session.add_expression("y0=2x0")?;
    assert_eq!(session.parse("1 + 2f(x0,y0)/3")?, 21.0);
    Ok(())
}

#[test]
fn user_function_parameters_do_not_leak_into_the_session() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("square(x)=x^2")?;
    assert_eq!(session.parse("square(5)")?, 25.0);
    // "x" was never declared at the session level.
    assert!(session.parse("x").is_err());
    Ok(())
}

#[test]
fn recursive_user_function_via_if() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("gcd(x,y)=if(y=0,x,gcd(y,x%y))")?;
    assert_eq!(session.parse("gcd(8,20)")?, 4.0);
    Ok(())
}

#[test]
fn redeclaring_a_function_replaces_the_old_body() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("f(x)=x+1")?;
    assert_eq!(session.parse("f(2)")?, 3.0);
    session.add_expression("f(x)=x*10")?;
    assert_eq!(session.parse("f(2)")?, 20.0);
    Ok(())
}

#[test]
fn cloning_a_session_does_not_leak_variable_mutations_back() -> Result<(), Box<dyn Error>> {
    let mut session = Session::create();
    session.add_expression("x = 1")?;
    let mut clone = session.clone();
    clone.add_expression("x = 99")?;
    assert_eq!(session.parse("x")?, 1.0);
    assert_eq!(clone.parse("x")?, 99.0);
    Ok(())
}
