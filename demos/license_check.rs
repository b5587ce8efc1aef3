use std::env;

use vmprotect::protector::{activation, hardware_id, licensing, ActivationReply};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("hardware id: {}", hardware_id::current_hwid());

    // Serial from the first argument, or an activation code with --activate
    let args: Vec<String> = env::args().skip(1).collect();
    let serial = match args.as_slice() {
        [flag, code] if flag == "--activate" => match activation::activate_license(code)? {
            ActivationReply::Granted(serial) => serial,
            ActivationReply::Denied(status) => {
                println!("activation denied: {}", status);
                return Ok(());
            }
        },
        [serial] => serial.clone(),
        _ => {
            println!("usage: license_check <serial> | --activate <code>");
            return Ok(());
        }
    };

    let state = licensing::set_serial_number(&serial)?;
    if !state.is_valid() {
        for reason in state.reasons() {
            println!("rejected: {}", reason);
        }
        return Ok(());
    }

    if let Some(data) = licensing::serial_number_data() {
        println!("licensed to {} <{}>", data.user_name, data.email);
        if data.expire_date.is_set() {
            println!("valid until {}", data.expire_date);
        }
    }
    Ok(())
}
