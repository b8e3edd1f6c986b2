//! Summaries of Junos JSON replies.
//!
//! Junos wraps every leaf value as `[{"data": "..."}]`; the types below mirror
//! that shape and ignore everything else in the reply.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Data {
    data: String,
}

fn first(field: &[Data]) -> Option<&str> {
    field.first().map(|d| d.data.trim())
}

fn count(field: &[Data]) -> u64 {
    first(field).and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct VersionReply {
    software_information: Vec<SoftwareInformation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct SoftwareInformation {
    host_name: Vec<Data>,
    product_model: Vec<Data>,
    product_name: Vec<Data>,
    junos_version: Vec<Data>,
    package_information: Vec<PackageInformation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PackageInformation {
    name: Vec<Data>,
    comment: Vec<Data>,
}

/// Hostname, model and software version from `show version | display json`.
pub fn device_info(json: &str) -> Result<String, serde_json::Error> {
    let reply: VersionReply = serde_json::from_str(json)?;
    let mut out = String::new();

    for info in &reply.software_information {
        let version = first(&info.junos_version).or_else(|| {
            info.package_information
                .iter()
                .find(|p| first(&p.name) == Some("junos"))
                .and_then(|p| first(&p.comment))
        });
        let model = first(&info.product_model).or_else(|| first(&info.product_name));

        out.push_str(&format!("Hostname: {}\n", first(&info.host_name).unwrap_or("unknown")));
        out.push_str(&format!("Model: {}\n", model.unwrap_or("unknown")));
        out.push_str(&format!("Junos: {}\n", version.unwrap_or("unknown")));
    }

    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct InterfaceReply {
    interface_information: Vec<InterfaceInformation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct InterfaceInformation {
    physical_interface: Vec<PhysicalInterface>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct PhysicalInterface {
    name: Vec<Data>,
    input_error_list: Vec<InputErrors>,
    output_error_list: Vec<OutputErrors>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct InputErrors {
    input_errors: Vec<Data>,
    input_drops: Vec<Data>,
    framing_errors: Vec<Data>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct OutputErrors {
    output_errors: Vec<Data>,
    output_drops: Vec<Data>,
}

/// Lists every physical interface with a nonzero error or drop counter from
/// `show interfaces extensive | display json`.
pub fn interface_errors(json: &str) -> Result<String, serde_json::Error> {
    let reply: InterfaceReply = serde_json::from_str(json)?;
    let mut out = String::new();

    for interface in reply
        .interface_information
        .iter()
        .flat_map(|info| info.physical_interface.iter())
    {
        let (input_errors, input_drops, framing_errors) = interface
            .input_error_list
            .first()
            .map(|l| (count(&l.input_errors), count(&l.input_drops), count(&l.framing_errors)))
            .unwrap_or_default();
        let (output_errors, output_drops) = interface
            .output_error_list
            .first()
            .map(|l| (count(&l.output_errors), count(&l.output_drops)))
            .unwrap_or_default();

        if input_errors + input_drops + framing_errors + output_errors + output_drops == 0 {
            continue;
        }

        out.push_str(&format!(
            "{}: input errors {}, input drops {}, framing errors {}, output errors {}, output drops {}\n",
            first(&interface.name).unwrap_or("unknown"),
            input_errors,
            input_drops,
            framing_errors,
            output_errors,
            output_drops
        ));
    }

    if out.is_empty() {
        out.push_str("No interface errors found.\n");
    }
    Ok(out)
}
