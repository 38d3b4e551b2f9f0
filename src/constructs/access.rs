//! SN-013: Network access between tiers.

use super::compute::ServiceHandle;
use super::database::DatabaseHandle;
use crate::core::template::{get_att, logical_id, CfnResource, Template};
use serde_json::json;

/// Allow the service's security group to reach the database on its
/// endpoint port. Returns the logical ID of the ingress rule.
///
/// The port is the endpoint's own port token rather than a configured
/// number, so the rule follows whatever port the database ends up on.
pub fn allow_from(
    template: &mut Template,
    db: &DatabaseHandle,
    service: &ServiceHandle,
) -> Result<String, String> {
    let port = db.endpoint().port.clone();
    template.add(
        logical_id(&["DatabaseCluster", "SecurityGroup", "from", "Service", "SecurityGroup"]),
        CfnResource::new(
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "Description": "Service tasks to database",
                "FromPort": port,
                "GroupId": get_att(&db.security_group, "GroupId"),
                "IpProtocol": "tcp",
                "SourceSecurityGroupId": get_att(&service.security_group, "GroupId"),
                "ToPort": port,
            }),
        ),
    )
}
