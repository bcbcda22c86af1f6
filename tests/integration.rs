use std::{cell::RefCell, rc::Rc, str::from_utf8};

use gabpay_ledger::{
    bin_utils::Service,
    config::LedgerConfig,
    processor::{ErrorKind, LedgerError},
};

const TEST_FILE: &str = include_str!("operations.csv");

#[test]
fn process_operations() {
    let errors: Rc<RefCell<Vec<(u64, ErrorKind)>>> = Rc::default();
    let mut output = Vec::new();
    let service = Service {
        input: TEST_FILE.as_bytes(),
        output: &mut output,
        config: LedgerConfig::default(),
        error_printer: Box::new({
            let errors = Rc::clone(&errors);
            move |line, err: LedgerError| errors.borrow_mut().push((line, err.kind()))
        }),
    };
    service.run().unwrap();

    assert_eq!(
        *errors.borrow(),
        vec![
            (8, ErrorKind::NotFound),             // second redeem of the same code
            (11, ErrorKind::NotFound),            // bill already paid
            (13, ErrorKind::InsufficientSavings), // withdraw above savings
            (14, ErrorKind::InsufficientFunds),   // transfer above balance
            (15, ErrorKind::NotFound),            // unknown receiver
            (16, ErrorKind::Validation),          // missing amount
        ]
    );

    let lines: Vec<&str> = from_utf8(&output).unwrap().lines().collect();
    assert_eq!(
        lines,
        vec![
            "id,name,phone,balance,savings",
            "1,Awa Diop,0700000001,500,0",
            "2,Binta Fall,0700000002,1000,0",
            "3,Cheikh Ndiaye,0700000003,10,50",
        ]
    );
}

#[test]
fn reject_malformed_script() {
    let mut output = Vec::new();
    let service = Service {
        input: "op,user\nwire_money,1\n".as_bytes(),
        output: &mut output,
        config: LedgerConfig::default(),
        error_printer: Box::new(|_, _| {}),
    };
    let err = service.run().unwrap_err();
    assert_eq!(err.to_string(), "Malformed row at line 2");
    assert!(output.is_empty());
}
